// crates/pob-core/src/item_text.rs
//
// Parsing of the free-text item blocks stored inside build XML.
//
// A block looks like the text the game copies to the clipboard, plus a few
// inline decorations: `{range:0.8}` records where a roll sits inside the
// `(min-max)` bounds printed on the same line, `{crafted}`/`{fractured}` mark
// mod origins, and other `{...}` spans carry editor metadata.

use regex::Regex;
use std::sync::OnceLock;

use crate::model::{Item, Rarity};

/// Lines dropped by [`format_item_text`].
pub const METADATA_PREFIXES: &[&str] = &[
    "Rarity:",
    "Crafted:",
    "Prefix:",
    "Suffix:",
    "LevelReq:",
    "Implicits:",
    "Sockets:",
];

/// Property lines that sit between the header and the mods of a block.
pub const PROPERTY_PREFIXES: &[&str] = &[
    "Sockets:",
    "LevelReq:",
    "Requires Level",
    "Item Level:",
    "Quality:",
    "Armour:",
    "Evasion:",
    "Evasion Rating:",
    "Energy Shield:",
    "Ward:",
    "Physical Damage:",
    "Elemental Damage:",
    "Chaos Damage:",
    "Critical Strike Chance:",
    "Attacks per Second:",
    "Weapon Range:",
    "Radius:",
    "Limited to:",
];

/// Editor bookkeeping lines that never count as mods.
const HEADER_METADATA_PREFIXES: &[&str] = &["Unique ID:", "Selected Variant:", "Variant:"];

/// Slot label synonyms, matched case-insensitively.
pub const SLOT_SYNONYMS: &[(&str, &str)] = &[
    ("Weapon 1", "Main Hand"),
    ("Weapon1", "Main Hand"),
    ("Main Hand", "Main Hand"),
    ("Weapon 2", "Off Hand"),
    ("Weapon2", "Off Hand"),
    ("Off Hand", "Off Hand"),
    ("Weapon 1 Swap", "Main Hand Swap"),
    ("Weapon1Swap", "Main Hand Swap"),
    ("Weapon 2 Swap", "Off Hand Swap"),
    ("Weapon2Swap", "Off Hand Swap"),
    ("Helm", "Helmet"),
    ("Helmet", "Helmet"),
    ("Body Armour", "Body Armour"),
    ("Body Armor", "Body Armour"),
    ("BodyArmour", "Body Armour"),
    ("Gloves", "Gloves"),
    ("Boots", "Boots"),
    ("Amulet", "Amulet"),
    ("Belt", "Belt"),
    ("Ring 1", "Ring 1"),
    ("Ring1", "Ring 1"),
    ("Ring 2", "Ring 2"),
    ("Ring2", "Ring 2"),
    ("Flask 1", "Flask 1"),
    ("Flask1", "Flask 1"),
    ("Flask 2", "Flask 2"),
    ("Flask2", "Flask 2"),
    ("Flask 3", "Flask 3"),
    ("Flask3", "Flask 3"),
    ("Flask 4", "Flask 4"),
    ("Flask4", "Flask 4"),
    ("Flask 5", "Flask 5"),
    ("Flask5", "Flask 5"),
];

const DEFAULT_RANGE_FRACTION: f64 = 0.5;
const MIN_MOD_LEN: usize = 3;

static RANGE_TAG: OnceLock<Regex> = OnceLock::new();
static BRACE_SPAN: OnceLock<Regex> = OnceLock::new();
static NUMERIC_RANGE: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();
static RARITY_LINE: OnceLock<Regex> = OnceLock::new();

fn range_tag() -> &'static Regex {
    RANGE_TAG.get_or_init(|| {
        Regex::new(r"\{range:\s*([0-9]*\.?[0-9]+)\s*\}").expect("range tag pattern")
    })
}

fn brace_span() -> &'static Regex {
    BRACE_SPAN.get_or_init(|| Regex::new(r"\{[^{}]*\}").expect("brace span pattern"))
}

fn numeric_range() -> &'static Regex {
    NUMERIC_RANGE.get_or_init(|| {
        Regex::new(r"\((-?\d+(?:\.\d+)?)-(-?\d+(?:\.\d+)?)\)").expect("numeric range pattern")
    })
}

fn whitespace_run() -> &'static Regex {
    WHITESPACE_RUN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

fn rarity_line() -> &'static Regex {
    RARITY_LINE.get_or_init(|| Regex::new(r"(?i)^rarity:\s*(\w+)").expect("rarity pattern"))
}

/// Reduce raw item text to its displayable mod lines.
///
/// Metadata lines are dropped, decorations removed and every `(min-max)`
/// range replaced by the value its line's `{range:f}` tag points at
/// (0.5 when the line has none). Already formatted text is returned unchanged.
pub fn format_item_text(raw: &str) -> String {
    raw.lines()
        .filter_map(format_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a single line, or `None` when nothing displayable remains.
pub fn format_line(line: &str) -> Option<String> {
    let fraction = range_tag()
        .captures(line)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|f| f.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_RANGE_FRACTION);

    let stripped = strip_brace_spans(line);
    let resolved = resolve_ranges(&stripped, fraction);
    let collapsed = whitespace_run().replace_all(&resolved, " ");
    let formatted = collapsed.trim();

    if formatted.is_empty() || has_prefix(formatted, METADATA_PREFIXES) {
        return None;
    }
    Some(formatted.to_string())
}

fn strip_brace_spans(line: &str) -> String {
    let mut current = line.to_string();
    while brace_span().is_match(&current) {
        current = brace_span().replace_all(&current, "").into_owned();
    }
    current
}

fn resolve_ranges(line: &str, fraction: f64) -> String {
    let mut current = line.to_string();
    while numeric_range().is_match(&current) {
        current = numeric_range()
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                let min = caps[1].parse::<f64>().unwrap_or(0.0);
                let max = caps[2].parse::<f64>().unwrap_or(min);
                let value = (min + fraction * (max - min)).round() as i64;
                value.to_string()
            })
            .into_owned();
    }
    current
}

fn has_prefix(line: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| {
        line.len() >= prefix.len()
            && line.is_char_boundary(prefix.len())
            && line[..prefix.len()].eq_ignore_ascii_case(prefix)
    })
}

/// Map a slot label onto its canonical spelling; unknown labels pass through.
pub fn normalize_slot(slot: &str) -> String {
    let compact = whitespace_run().replace_all(slot.trim(), " ");
    SLOT_SYNONYMS
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(&compact))
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| compact.into_owned())
}

/// Header fields and mod section of a block, shared by [`parse_item_block`]
/// and [`Item::important_mods`].
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ItemLayout<'a> {
    pub rarity: Rarity,
    pub name: &'a str,
    pub base_type: &'a str,
    pub implicit_count: usize,
    pub item_level: Option<u32>,
    pub quality: Option<u32>,
    pub sockets: Option<&'a str>,
    /// Raw mod lines, decorations intact.
    pub mod_lines: Vec<&'a str>,
}

pub(crate) fn layout(raw: &str) -> Option<ItemLayout<'_>> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let first = *lines.first()?;

    let mut out = ItemLayout::default();
    let mods_start = match rarity_line().captures(first) {
        Some(caps) => {
            out.rarity = Rarity::from_label(&caps[1]);
            match out.rarity {
                Rarity::Unique | Rarity::Rare => {
                    out.name = lines.get(1).copied().unwrap_or_default();
                    out.base_type = lines.get(2).copied().unwrap_or(out.name);
                    3
                }
                Rarity::Magic | Rarity::Normal => {
                    out.base_type = lines.get(1).copied().unwrap_or_default();
                    out.name = out.base_type;
                    2
                }
            }
        }
        None => {
            out.name = first;
            out.base_type = lines.get(1).copied().unwrap_or(first);
            2
        }
    };

    let mut confirmed = false;
    for (index, &line) in lines.iter().enumerate().skip(mods_start) {
        if let Some(value) = strip_prefix_ci(line, "Item Level:") {
            out.item_level = leading_number(value);
            continue;
        }
        if let Some(value) = strip_prefix_ci(line, "Quality:") {
            out.quality = leading_number(value);
            continue;
        }
        if let Some(value) = strip_prefix_ci(line, "Sockets:") {
            out.sockets = Some(value.trim());
            continue;
        }
        if has_prefix(line, PROPERTY_PREFIXES) {
            continue;
        }
        if let Some(value) = strip_prefix_ci(line, "Implicits:") {
            out.implicit_count = leading_number(value).unwrap_or(0) as usize;
            confirmed = true;
            continue;
        }
        if has_prefix(line, METADATA_PREFIXES) || has_prefix(line, HEADER_METADATA_PREFIXES) {
            continue;
        }
        if confirmed || index >= mods_start + 3 {
            out.mod_lines.push(line);
        }
    }
    Some(out)
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    has_prefix(line, &[prefix]).then(|| &line[prefix.len()..])
}

fn leading_number(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .trim_start_matches('+')
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Clean a raw mod line for display, keeping its `(min-max)` ranges.
pub fn clean_mod_line(line: &str) -> Option<String> {
    let tagged = line
        .replace("{crafted}", "[C] ")
        .replace("{fractured}", "[F] ");
    let stripped = strip_brace_spans(&tagged);
    let cleaned = whitespace_run().replace_all(&stripped, " ").trim().to_string();
    (cleaned.chars().count() >= MIN_MOD_LEN).then_some(cleaned)
}

/// Parse one item block. `id_or_slot` becomes the item's initial slot label.
///
/// Returns `None` when the block has no non-blank lines.
pub fn parse_item_block(id_or_slot: &str, raw: &str) -> Option<Item> {
    let layout = layout(raw)?;
    Some(Item {
        name: layout.name.to_string(),
        slot: id_or_slot.to_string(),
        rarity: layout.rarity,
        base_type: layout.base_type.to_string(),
        item_level: layout.item_level,
        quality: layout.quality,
        sockets: layout.sockets.map(str::to_string),
        implicit_count: layout.implicit_count,
        mods: layout
            .mod_lines
            .iter()
            .filter_map(|line| clean_mod_line(line))
            .collect(),
        raw_text: raw.to_string(),
    })
}
