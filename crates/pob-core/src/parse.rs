// crates/pob-core/src/parse.rs
//
// Build XML parser.
// - Parses the document into an element tree (see xml.rs); malformed XML fails
// - Every section (Build, Skills, Items, Tree) is optional and may be missing
// - Inside a section, bad entries are skipped or defaulted, never fatal:
//   nameless gems are dropped, dangling slot references are omitted,
//   unparseable tree URLs decode to nothing
// - Set containers are optional: a section without SkillSet / ItemSet / Spec
//   children is read as one implicit set

use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::gems::{self, GemReference};
use crate::item_text::{normalize_slot, parse_item_block};
use crate::model::*;
use crate::tree_url::decode_tree_url;
use crate::xml::{Element, parse_document};

/// Ascendancy points assumed whenever a tree spec names an ascendancy class.
pub const FULL_ASCENDANCY_POINTS: usize = 8;

/// Title of implicit sets.
pub const DEFAULT_SET_TITLE: &str = "Default";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("utf8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    #[error("unexpected structure: {0}")]
    Structure(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses build XML, classifying gems against a [`GemReference`].
pub struct BuildParser<'a> {
    gems: &'a dyn GemReference,
}

impl<'a> BuildParser<'a> {
    pub fn new(gems: &'a dyn GemReference) -> Self {
        Self { gems }
    }

    /// Parse a build document such as
    /// `<PathOfBuilding><Build .../><Skills>...</Skills><Items>...</Items><Tree>...</Tree></PathOfBuilding>`.
    pub fn parse(&self, xml: &str) -> ParseResult<Build> {
        let root = parse_document(xml)?;
        let mut build = Build::default();
        build.level = 1;

        if let Some(info) = root.child("Build") {
            read_metadata(info, &mut build);
        }
        if let Some(notes) = root.child("Notes") {
            build.notes = notes.text.trim().to_string();
        }

        if let Some(skills) = root.child("Skills") {
            build.skill_sets = self.read_skill_sets(skills);
            build.set_active_skill_set(active_index(skills.attr("activeSkillSet")));
        }
        if let Some(items) = root.child("Items") {
            build.item_sets = read_item_sets(items);
            build.set_active_item_set(active_index(items.attr("activeItemSet")));
        }
        if let Some(tree) = root.child("Tree") {
            build.tree_sets = read_tree_sets(tree);
            build.set_active_tree_set(active_index(tree.attr("activeSpec")));
        }

        debug!(
            "parsed build: {} skill sets, {} item sets, {} tree sets",
            build.skill_sets.len(),
            build.item_sets.len(),
            build.tree_sets.len()
        );
        Ok(build)
    }

    fn read_skill_sets(&self, skills: &Element) -> Vec<SkillSet> {
        let sets: Vec<&Element> = skills.children_named("SkillSet").collect();
        if sets.is_empty() {
            return vec![self.read_skill_set(skills, DEFAULT_SET_TITLE.to_string())];
        }
        sets.into_iter()
            .enumerate()
            .map(|(idx, set)| {
                let title = set
                    .first_attr(&["title"])
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Skill set {}", idx + 1));
                self.read_skill_set(set, title)
            })
            .collect()
    }

    fn read_skill_set(&self, set: &Element, title: String) -> SkillSet {
        SkillSet {
            title,
            groups: set
                .children_named("Skill")
                .enumerate()
                .map(|(idx, group)| self.read_link_group(group, idx))
                .collect(),
        }
    }

    fn read_link_group(&self, group: &Element, index: usize) -> GemLinkGroup {
        let slot = group.first_attr(&["slot"]).map(str::to_string);
        let name = group
            .first_attr(&["label"])
            .map(str::to_string)
            .or_else(|| slot.clone())
            .unwrap_or_else(|| format!("Group {}", index + 1));
        let main_active_skill = parse_or(group.attr("mainActiveSkill"), 1);

        let mut gems = Vec::new();
        for element in group.children_named("Gem") {
            let position = gems.len() + 1;
            if let Some(mut gem) = self.read_gem(element, &name, position) {
                gem.is_main_active = position == main_active_skill;
                gems.push(gem);
            }
        }

        GemLinkGroup {
            name,
            slot,
            enabled: parse_bool_or(group.attr("enabled"), true),
            main_active_skill,
            gems,
        }
    }

    fn read_gem(&self, element: &Element, group: &str, position: usize) -> Option<Gem> {
        let Some(raw_name) = element.first_attr(&["nameSpec", "name"]) else {
            debug!("skipping gem without a name in group {group}");
            return None;
        };
        let skill_id = element.first_attr(&["skillId"]).map(str::to_string);

        let mut name = gems::normalize_gem_name(raw_name);
        if name.is_empty() {
            debug!("skipping gem {raw_name:?} in group {group}: nothing left after normalizing");
            return None;
        }
        if skill_id.as_deref().is_some_and(|id| id.starts_with("Support"))
            && !name.ends_with("Support")
        {
            name.push_str(" Support");
        }

        let class = gems::classify(self.gems, &name);
        Some(Gem {
            name,
            skill_id,
            level: parse_or(element.attr("level"), 1),
            quality: parse_or(element.attr("quality"), 0),
            kind: class.kind,
            color: class.color,
            enabled: parse_bool_or(element.attr("enabled"), true),
            group: group.to_string(),
            position,
            is_main_active: false,
            acquisition: class.acquisition,
        })
    }
}

/// Parse `xml` with `gems` as the gem reference.
pub fn parse_build(xml: &str, gems: &dyn GemReference) -> ParseResult<Build> {
    BuildParser::new(gems).parse(xml)
}

fn read_metadata(info: &Element, build: &mut Build) {
    build.name = info.attr("name").unwrap_or_default().trim().to_string();
    build.class_name = info.attr("className").unwrap_or_default().trim().to_string();
    build.level = parse_or(info.attr("level"), 1);
    build.ascendancy_name = info
        .first_attr(&["ascendClassName"])
        .map(str::trim)
        .filter(|name| !name.eq_ignore_ascii_case("none"))
        .map(str::to_string);
}

fn read_item_sets(items: &Element) -> Vec<ItemSet> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, Item> = HashMap::new();
    for element in items.children_named("Item") {
        let Some(id) = element.first_attr(&["id"]).map(str::trim) else {
            debug!("skipping item without an id");
            continue;
        };
        let Some(item) = parse_item_block(id, &element.text) else {
            debug!("item {id} has no text");
            continue;
        };
        if by_id.insert(id.to_string(), item).is_none() {
            order.push(id.to_string());
        }
    }

    let sets: Vec<&Element> = items.children_named("ItemSet").collect();
    if sets.is_empty() {
        let mut set = ItemSet::new(DEFAULT_SET_TITLE);
        for id in &order {
            if let Some(item) = by_id.get(id) {
                set.insert(item.clone());
            }
        }
        return vec![set];
    }

    sets.into_iter()
        .enumerate()
        .map(|(idx, element)| {
            let title = element
                .first_attr(&["title"])
                .map(str::to_string)
                .unwrap_or_else(|| format!("Item set {}", idx + 1));
            let mut set = ItemSet::new(title);
            for slot in element.children_named("Slot") {
                let (Some(slot_name), Some(item_id)) =
                    (slot.first_attr(&["name"]), slot.first_attr(&["itemId"]))
                else {
                    continue;
                };
                match by_id.get(item_id.trim()) {
                    Some(item) => {
                        let mut item = item.clone();
                        item.slot = normalize_slot(slot_name);
                        set.insert(item);
                    }
                    None => debug!("slot {slot_name} references missing item {item_id}"),
                }
            }
            set
        })
        .collect()
}

fn read_tree_sets(tree: &Element) -> Vec<TreeSet> {
    let specs: Vec<&Element> = tree.children_named("Spec").collect();
    if specs.is_empty() {
        return vec![read_tree_spec(tree, DEFAULT_SET_TITLE.to_string())];
    }
    specs
        .into_iter()
        .enumerate()
        .map(|(idx, spec)| {
            let title = spec
                .first_attr(&["title"])
                .map(str::to_string)
                .unwrap_or_else(|| format!("Tree {}", idx + 1));
            read_tree_spec(spec, title)
        })
        .collect()
}

fn read_tree_spec(spec: &Element, title: String) -> TreeSet {
    let url = spec
        .child("URL")
        .map(|element| element.text.trim())
        .filter(|text| !text.is_empty())
        .or_else(|| spec.first_attr(&["url"]))
        .unwrap_or_default()
        .to_string();

    let decoded = decode_tree_url(&url);
    let mut nodes: BTreeSet<u16> = decoded.nodes.iter().copied().collect();
    if nodes.is_empty() {
        nodes = parse_node_list(spec.attr("nodes"));
    }
    let mut mastery_effects = decoded.mastery_effects.clone();
    if mastery_effects.is_empty() {
        mastery_effects = parse_mastery_effects(spec.attr("masteryEffects"));
    }

    let decoded_any = decoded.version > 0 || !decoded.is_empty();
    let class_id = spec
        .attr("classId")
        .and_then(|v| v.trim().parse().ok())
        .or(decoded_any.then_some(decoded.class_id));
    let ascendancy_id = spec
        .attr("ascendClassId")
        .and_then(|v| v.trim().parse().ok())
        .or(decoded.ascendancy_id);

    TreeSet {
        title,
        tree_version: spec.first_attr(&["treeVersion"]).map(str::to_string),
        url,
        class_id,
        ascendancy_id,
        points_used: nodes.len(),
        ascendancy_points_used: ascendancy_points(spec.attr("ascendClassId")),
        nodes,
        mastery_effects,
        keystones: Vec::new(),
        notables: Vec::new(),
    }
}

fn ascendancy_points(ascend_class_id: Option<&str>) -> usize {
    match ascend_class_id.map(str::trim) {
        Some(value) if !value.is_empty() && value != "0" && value.parse::<u32>() != Ok(0) => {
            FULL_ASCENDANCY_POINTS
        }
        _ => 0,
    }
}

/// `"1,2,3"` -> `{1, 2, 3}`; unparseable and zero entries are skipped.
fn parse_node_list(value: Option<&str>) -> BTreeSet<u16> {
    value
        .unwrap_or_default()
        .split(',')
        .filter_map(|node| node.trim().parse::<u16>().ok())
        .filter(|node| *node != 0)
        .collect()
}

/// `"{node,effect},{node,effect}"` -> node -> effect.
fn parse_mastery_effects(value: Option<&str>) -> BTreeMap<u16, u16> {
    let mut out = BTreeMap::new();
    for pair in value.unwrap_or_default().split('}') {
        let pair = pair.trim_start_matches([',', ' ']).trim_start_matches('{');
        let Some((node, effect)) = pair.split_once(',') else {
            continue;
        };
        if let (Ok(node), Ok(effect)) = (node.trim().parse::<u16>(), effect.trim().parse::<u16>())
            && node != 0
            && effect != 0
        {
            out.insert(node, effect);
        }
    }
    out
}

/// 1-based XML index -> 0-based; missing or unparseable means the first set.
fn active_index(value: Option<&str>) -> usize {
    parse_or::<usize>(value, 1).saturating_sub(1)
}

fn parse_or<T: std::str::FromStr>(value: Option<&str>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Textual boolean: `true`/`1`/`yes` and `false`/`0`/`no`, case-insensitive.
pub fn parse_bool_or(value: Option<&str>, default: bool) -> bool {
    let Some(value) = value else { return default };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    }
}
