// crates/pob-core/src/gems.rs
//
// Gem name normalization and the gem reference lookup used to classify gems.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::model::{GemKind, SocketColor};

/// Acquisition text for gems the reference data does not know.
pub const DROP_ONLY: &str = "Drop only";

const QUALITY_PREFIXES: &[&str] = &["Anomalous ", "Divergent ", "Phantasmal "];

static PAREN_QUALIFIER: OnceLock<Regex> = OnceLock::new();
static SUPPORT_SUFFIX: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();

fn paren_qualifier() -> &'static Regex {
    PAREN_QUALIFIER.get_or_init(|| Regex::new(r"\s*\(([^()]*)\)").expect("qualifier pattern"))
}

fn support_suffix() -> &'static Regex {
    SUPPORT_SUFFIX
        .get_or_init(|| Regex::new(r"(?i)\s+support(\s+gem)?$").expect("support suffix pattern"))
}

fn whitespace_run() -> &'static Regex {
    WHITESPACE_RUN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

/// Canonical form of a gem name.
///
/// `Elemental Hit Support (Anomalous)`, `Anomalous Elemental Hit Support`,
/// `Elemental Hit (Support)` and `Elemental Hit Support Gem` all become
/// `Elemental Hit Support`.
pub fn normalize_gem_name(name: &str) -> String {
    let mut is_support = false;
    let mut without_qualifiers = name.to_string();
    while paren_qualifier().is_match(&without_qualifiers) {
        without_qualifiers = paren_qualifier()
            .replace_all(&without_qualifiers, |caps: &regex::Captures<'_>| {
                if caps[1].trim().eq_ignore_ascii_case("support") {
                    is_support = true;
                }
                ""
            })
            .into_owned();
    }
    let mut current = whitespace_run()
        .replace_all(without_qualifiers.trim(), " ")
        .into_owned();

    while let Some(prefix) = QUALITY_PREFIXES
        .iter()
        .find(|prefix| current.len() > prefix.len() && current.starts_with(**prefix))
    {
        current = current[prefix.len()..].to_string();
    }

    if support_suffix().is_match(&current) {
        is_support = true;
        current = support_suffix().replace(&current, "").into_owned();
    }
    if is_support && !current.is_empty() {
        current.push_str(" Support");
    }
    current
}

/// Name-only classification used when the reference lookup misses.
pub fn is_support_name(name: &str) -> bool {
    name.contains("Support")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemSource {
    pub act: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

impl GemSource {
    fn describe(&self) -> String {
        let mut out = format!("Act {}", self.act);
        match (&self.quest, &self.vendor) {
            (Some(quest), Some(vendor)) => out.push_str(&format!(": {quest} ({vendor})")),
            (Some(quest), None) => out.push_str(&format!(": {quest}")),
            (None, Some(vendor)) => out.push_str(&format!(": {vendor}")),
            (None, None) => {}
        }
        out
    }
}

/// Reference data for one gem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemInfo {
    pub name: String,
    pub color: SocketColor,
    #[serde(default)]
    pub is_support: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub sources: Vec<GemSource>,
}

impl GemInfo {
    pub fn acquisition(&self) -> String {
        if self.sources.is_empty() {
            return DROP_ONLY.to_string();
        }
        self.sources
            .iter()
            .map(GemSource::describe)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Lookup of gem reference data by canonical gem name.
pub trait GemReference {
    fn lookup(&self, name: &str) -> Option<&GemInfo>;
}

/// In-memory [`GemReference`], keyed case-insensitively by canonical name.
#[derive(Debug, Clone, Default)]
pub struct GemCatalog {
    by_name: HashMap<String, GemInfo>,
}

impl GemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of [`GemInfo`] records.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<GemInfo> = serde_json::from_str(json)?;
        Ok(entries.into_iter().collect())
    }

    pub fn insert(&mut self, info: GemInfo) {
        let key = normalize_gem_name(&info.name).to_lowercase();
        self.by_name.insert(key, info);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl FromIterator<GemInfo> for GemCatalog {
    fn from_iter<I: IntoIterator<Item = GemInfo>>(iter: I) -> Self {
        let mut catalog = GemCatalog::new();
        for info in iter {
            catalog.insert(info);
        }
        catalog
    }
}

impl GemReference for GemCatalog {
    fn lookup(&self, name: &str) -> Option<&GemInfo> {
        self.by_name.get(&name.to_lowercase())
    }
}

/// Classification of a gem after consulting the reference data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemClassification {
    pub kind: GemKind,
    pub color: SocketColor,
    pub acquisition: String,
}

/// Classify `name` (already canonical) against `reference`, falling back to
/// the name heuristic, a white socket and [`DROP_ONLY`] on a miss.
pub fn classify(reference: &dyn GemReference, name: &str) -> GemClassification {
    match reference.lookup(name) {
        Some(info) => GemClassification {
            kind: if info.is_support || is_support_name(name) {
                GemKind::Support
            } else {
                GemKind::Active
            },
            color: info.color,
            acquisition: info.acquisition(),
        },
        None => GemClassification {
            kind: if is_support_name(name) {
                GemKind::Support
            } else {
                GemKind::Active
            },
            color: SocketColor::default(),
            acquisition: DROP_ONLY.to_string(),
        },
    }
}
