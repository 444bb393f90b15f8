pub mod gems;
pub mod item_text;
pub mod model;
pub mod parse;
pub mod passives;
pub mod paste;
pub mod tree_url;
pub mod xml;

pub use gems::{GemCatalog, GemInfo, GemReference, GemSource};
pub use item_text::{format_item_text, normalize_slot, parse_item_block};
pub use model::*;
pub use parse::{BuildParser, ParseError, ParseResult, parse_build};
pub use passives::{PassiveNode, PassiveTreeReference};
pub use paste::{PasteError, PasteErrorKind, PasteResult};
pub use tree_url::{TreeUrlDecodeResult, decode_tree_url};

/// Stage of [`load_build`] that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Decode,
    Decompress,
    Xml,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("paste code: {0}")]
    Paste(#[from] PasteError),

    #[error("build xml: {0}")]
    Xml(#[from] ParseError),
}

impl LoadError {
    pub fn stage(&self) -> LoadStage {
        match self {
            LoadError::Paste(err) => match err.kind() {
                PasteErrorKind::Decompression => LoadStage::Decompress,
                PasteErrorKind::Format | PasteErrorKind::Encoding => LoadStage::Decode,
            },
            LoadError::Xml(_) => LoadStage::Xml,
        }
    }
}

/// Decode a paste code and parse the build it carries.
pub fn load_build(paste_code: &str, gems: &dyn GemReference) -> Result<Build, LoadError> {
    let xml = paste::decode(paste_code)?;
    Ok(parse_build(&xml, gems)?)
}
