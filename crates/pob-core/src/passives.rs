// crates/pob-core/src/passives.rs
//
// Passive tree reference data and the keystone/notable enrichment of tree sets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::TreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveNode {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub is_keystone: bool,
    #[serde(default)]
    pub is_notable: bool,
    #[serde(default)]
    pub is_mastery: bool,
}

/// Lookup of passive node metadata by node id.
pub trait PassiveTreeReference {
    fn node(&self, id: u16) -> Option<&PassiveNode>;
}

impl PassiveTreeReference for HashMap<u16, PassiveNode> {
    fn node(&self, id: u16) -> Option<&PassiveNode> {
        self.get(&id)
    }
}

impl TreeSet {
    /// Fill `keystones` and `notables` from the allocated nodes, in node id order.
    ///
    /// Nodes the reference does not know are ignored.
    pub fn enrich(&mut self, tree: &dyn PassiveTreeReference) {
        self.keystones.clear();
        self.notables.clear();
        for node in self.nodes.iter().filter_map(|id| tree.node(*id)) {
            if node.is_keystone {
                self.keystones.push(node.name.clone());
            } else if node.is_notable {
                self.notables.push(node.name.clone());
            }
        }
    }
}
