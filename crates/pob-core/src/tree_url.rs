// crates/pob-core/src/tree_url.rs
//
// Decoder for the binary payload embedded in passive tree share URLs.
//
// The payload is the last path segment of the URL, URL-safe Base64 encoded.
// Its layout depends on the leading big-endian `u32` version:
//
// | version | class | ascendancy | node count        | clusters | masteries |
// |---------|-------|------------|-------------------|----------|-----------|
// | 0..=3   | `[4]` | -          | `(len - 6) / 2`   | -        | -         |
// | 4       | `[4]` | `[5]`      | `[6]`             | -        | -         |
// | 5       | `[4]` | `[5]`      | `[6]`             | yes      | -         |
// | 6       | `[4]` | `[5]`      | `[6]`             | yes      | yes       |
//
// Decoding is best effort: malformed payloads, unknown versions and short
// buffers produce an empty `TreeUrlDecodeResult` instead of an error, and
// truncated tables keep whatever entries were complete.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;

use crate::paste::normalize_base64;

/// Newest payload version this decoder understands.
pub const MAX_SUPPORTED_VERSION: u32 = 6;

/// Payloads shorter than this cannot carry a version and class.
pub const MIN_PAYLOAD_LEN: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeUrlDecodeResult {
    pub version: u32,
    pub class_id: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ascendancy_id: Option<u8>,
    /// Regular nodes in table order, followed by cluster jewel nodes.
    #[serde(default)]
    pub nodes: Vec<u16>,
    /// Mastery node id -> selected effect id.
    #[serde(default)]
    pub mastery_effects: BTreeMap<u16, u16>,
}

impl TreeUrlDecodeResult {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.mastery_effects.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeCount {
    /// One byte count precedes the node table.
    Explicit,
    /// No count byte; every remaining byte pair is a node.
    Inferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TreeUrlLayout {
    has_ascendancy: bool,
    node_count: NodeCount,
    node_table_offset: u64,
    has_cluster_nodes: bool,
    has_masteries: bool,
}

const LEGACY_LAYOUT: TreeUrlLayout = TreeUrlLayout {
    has_ascendancy: false,
    node_count: NodeCount::Inferred,
    node_table_offset: 6,
    has_cluster_nodes: false,
    has_masteries: false,
};

const V4_LAYOUT: TreeUrlLayout = TreeUrlLayout {
    has_ascendancy: true,
    node_count: NodeCount::Explicit,
    node_table_offset: 7,
    has_cluster_nodes: false,
    has_masteries: false,
};

const V5_LAYOUT: TreeUrlLayout = TreeUrlLayout {
    has_cluster_nodes: true,
    ..V4_LAYOUT
};

const V6_LAYOUT: TreeUrlLayout = TreeUrlLayout {
    has_masteries: true,
    ..V5_LAYOUT
};

fn layout_for(version: u32) -> Option<TreeUrlLayout> {
    match version {
        0..=3 => Some(LEGACY_LAYOUT),
        4 => Some(V4_LAYOUT),
        5 => Some(V5_LAYOUT),
        6 => Some(V6_LAYOUT),
        _ => None,
    }
}

/// Decode the allocation carried by a passive tree share URL.
///
/// An empty or whitespace-only URL means "nothing allocated" and yields an
/// empty result, as does any payload that cannot be decoded.
pub fn decode_tree_url(url: &str) -> TreeUrlDecodeResult {
    let segment = payload_segment(url);
    if segment.is_empty() {
        return TreeUrlDecodeResult::default();
    }
    match STANDARD.decode(normalize_base64(segment)) {
        Ok(bytes) => decode_payload(&bytes),
        Err(err) => {
            debug!("tree url payload is not base64: {err}");
            TreeUrlDecodeResult::default()
        }
    }
}

/// Decode an already Base64-decoded tree payload.
pub fn decode_payload(bytes: &[u8]) -> TreeUrlDecodeResult {
    if bytes.len() < MIN_PAYLOAD_LEN {
        debug!("tree payload of {} bytes is too short", bytes.len());
        return TreeUrlDecodeResult::default();
    }

    let mut cursor = Cursor::new(bytes);
    let (Ok(version), Ok(class_id)) = (cursor.read_u32::<BigEndian>(), cursor.read_u8()) else {
        return TreeUrlDecodeResult::default();
    };
    let Some(layout) = layout_for(version) else {
        debug!("tree payload version {version} is newer than {MAX_SUPPORTED_VERSION}");
        return TreeUrlDecodeResult::default();
    };

    let mut result = TreeUrlDecodeResult {
        version,
        class_id,
        ..TreeUrlDecodeResult::default()
    };
    if layout.has_ascendancy {
        result.ascendancy_id = cursor.read_u8().ok();
    }

    let node_count = match layout.node_count {
        NodeCount::Explicit => cursor.read_u8().map(usize::from).unwrap_or(0),
        NodeCount::Inferred => (bytes.len() - MIN_PAYLOAD_LEN) / 2,
    };
    cursor.set_position(layout.node_table_offset);
    read_node_table(&mut cursor, node_count, &mut result.nodes);
    trace!("tree payload v{version}: {} regular nodes", result.nodes.len());

    if layout.has_cluster_nodes {
        let cluster_count = cursor.read_u8().map(usize::from).unwrap_or(0);
        read_node_table(&mut cursor, cluster_count, &mut result.nodes);
    }

    if layout.has_masteries {
        let mastery_count = cursor.read_u8().map(usize::from).unwrap_or(0);
        read_mastery_table(&mut cursor, mastery_count, &mut result.mastery_effects);
    }

    result
}

fn read_node_table(cursor: &mut Cursor<&[u8]>, count: usize, out: &mut Vec<u16>) {
    for _ in 0..count {
        match cursor.read_u16::<BigEndian>() {
            Ok(0) => {}
            Ok(node) => out.push(node),
            Err(_) => {
                trace!("node table truncated after {} entries", out.len());
                break;
            }
        }
    }
}

fn read_mastery_table(cursor: &mut Cursor<&[u8]>, count: usize, out: &mut BTreeMap<u16, u16>) {
    for _ in 0..count {
        let (Ok(effect), Ok(node)) = (
            cursor.read_u16::<BigEndian>(),
            cursor.read_u16::<BigEndian>(),
        ) else {
            break;
        };
        if effect != 0 && node != 0 {
            out.insert(node, effect);
        }
    }
}

/// Last non-empty path segment of `url`, ignoring any query or fragment.
fn payload_segment(url: &str) -> &str {
    let url = url.trim();
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end]
        .split('/')
        .rev()
        .find(|segment| !segment.trim().is_empty())
        .map(str::trim)
        .unwrap_or("")
}
