use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::item_text;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Build {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class_name: String,
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ascendancy_name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,

    #[serde(default)]
    pub skill_sets: Vec<SkillSet>,
    #[serde(default)]
    pub item_sets: Vec<ItemSet>,
    #[serde(default)]
    pub tree_sets: Vec<TreeSet>,

    #[serde(default)]
    active_skill_set: usize,
    #[serde(default)]
    active_item_set: usize,
    #[serde(default)]
    active_tree_set: usize,
}

/// Clamp `index` into `[0, len)`; an empty collection clamps to 0.
fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

impl Build {
    pub fn active_skill_set_index(&self) -> usize {
        clamp_index(self.active_skill_set, self.skill_sets.len())
    }

    pub fn active_item_set_index(&self) -> usize {
        clamp_index(self.active_item_set, self.item_sets.len())
    }

    pub fn active_tree_set_index(&self) -> usize {
        clamp_index(self.active_tree_set, self.tree_sets.len())
    }

    pub fn active_skill_set(&self) -> Option<&SkillSet> {
        self.skill_sets.get(self.active_skill_set_index())
    }

    pub fn active_item_set(&self) -> Option<&ItemSet> {
        self.item_sets.get(self.active_item_set_index())
    }

    pub fn active_tree_set(&self) -> Option<&TreeSet> {
        self.tree_sets.get(self.active_tree_set_index())
    }

    pub fn set_active_skill_set(&mut self, index: usize) {
        self.active_skill_set = clamp_index(index, self.skill_sets.len());
    }

    pub fn set_active_item_set(&mut self, index: usize) {
        self.active_item_set = clamp_index(index, self.item_sets.len());
    }

    pub fn set_active_tree_set(&mut self, index: usize) {
        self.active_tree_set = clamp_index(index, self.tree_sets.len());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillSet {
    pub title: String,
    #[serde(default)]
    pub groups: Vec<GemLinkGroup>,
}

impl SkillSet {
    pub fn total_gems(&self) -> usize {
        self.groups.iter().map(|g| g.gems.len()).sum()
    }

    pub fn active_gems(&self) -> usize {
        self.gems().filter(|g| g.kind == GemKind::Active).count()
    }

    pub fn support_gems(&self) -> usize {
        self.gems().filter(|g| g.kind == GemKind::Support).count()
    }

    pub fn enabled_link_groups(&self) -> impl Iterator<Item = &GemLinkGroup> {
        self.groups.iter().filter(|g| g.enabled)
    }

    pub fn gems(&self) -> impl Iterator<Item = &Gem> {
        self.groups.iter().flat_map(|g| g.gems.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemLinkGroup {
    /// Display name: the label if one is set, else the slot.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    pub enabled: bool,
    /// 1-based position of the main active gem.
    pub main_active_skill: usize,
    #[serde(default)]
    pub gems: Vec<Gem>,
}

impl GemLinkGroup {
    pub fn main_active_gem(&self) -> Option<&Gem> {
        self.gems.iter().find(|g| g.is_main_active)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GemKind {
    #[default]
    Active,
    Support,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketColor {
    Red,
    Green,
    Blue,
    #[default]
    White,
}

impl SocketColor {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "r" | "red" | "str" | "strength" => Some(SocketColor::Red),
            "g" | "green" | "dex" | "dexterity" => Some(SocketColor::Green),
            "b" | "blue" | "int" | "intelligence" => Some(SocketColor::Blue),
            "w" | "white" => Some(SocketColor::White),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    pub level: u32,
    pub quality: u32,
    pub kind: GemKind,
    pub color: SocketColor,
    pub enabled: bool,
    /// Name of the owning [`GemLinkGroup`].
    pub group: String,
    /// 1-based position inside the owning group.
    pub position: usize,
    pub is_main_active: bool,
    pub acquisition: String,
}

impl Gem {
    pub fn is_support(&self) -> bool {
        self.kind == GemKind::Support
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    #[default]
    Normal,
    Magic,
    Rare,
    Unique,
}

impl Rarity {
    /// Case-insensitive; unknown labels read as [`Rarity::Normal`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "magic" => Rarity::Magic,
            "rare" => Rarity::Rare,
            "unique" => Rarity::Unique,
            _ => Rarity::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Normal => "Normal",
            Rarity::Magic => "Magic",
            Rarity::Rare => "Rare",
            Rarity::Unique => "Unique",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub slot: String,
    pub rarity: Rarity,
    pub base_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sockets: Option<String>,
    #[serde(default)]
    pub implicit_count: usize,
    /// Mod lines with origin tags (`[C]`, `[F]`) and ranges kept.
    #[serde(default)]
    pub mods: Vec<String>,
    pub raw_text: String,
}

impl Item {
    /// Mod lines with decorations removed and ranges resolved to rolled values.
    ///
    /// Always recomputed from `raw_text`.
    pub fn important_mods(&self) -> Vec<String> {
        item_text::layout(&self.raw_text)
            .map(|layout| {
                layout
                    .mod_lines
                    .iter()
                    .filter_map(|line| item_text::format_line(line))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The item text as it would be displayed, metadata removed.
    pub fn formatted_text(&self) -> String {
        item_text::format_item_text(&self.raw_text)
    }

    pub fn implicit_mods(&self) -> &[String] {
        &self.mods[..self.implicit_count.min(self.mods.len())]
    }

    pub fn explicit_mods(&self) -> &[String] {
        &self.mods[self.implicit_count.min(self.mods.len())..]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSet {
    pub title: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl ItemSet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    /// Place `item` in its slot, replacing any item already there.
    /// Slot synonyms (`Weapon 1` / `Main Hand`) share one slot.
    pub fn insert(&mut self, mut item: Item) {
        item.slot = item_text::normalize_slot(&item.slot);
        match self
            .items
            .iter_mut()
            .find(|existing| existing.slot.eq_ignore_ascii_case(&item.slot))
        {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn get(&self, slot: &str) -> Option<&Item> {
        let slot = item_text::normalize_slot(slot);
        self.items
            .iter()
            .find(|item| item.slot.eq_ignore_ascii_case(&slot))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSet {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_version: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ascendancy_id: Option<u8>,
    #[serde(default)]
    pub nodes: BTreeSet<u16>,
    /// Mastery node id -> selected effect id.
    #[serde(default)]
    pub mastery_effects: BTreeMap<u16, u16>,
    pub points_used: usize,
    pub ascendancy_points_used: usize,
    #[serde(default)]
    pub keystones: Vec<String>,
    #[serde(default)]
    pub notables: Vec<String>,
}
