// crates/pob-core/src/paste.rs
//
// Paste codes are zlib streams wrapped in URL-safe Base64:
// - whitespace from copy/paste is ignored
// - `-`/`_` are accepted in place of `+`/`/`, stripped padding is restored
// - the 2-byte zlib header is skipped and the body inflated as raw DEFLATE
// - the Adler-32 trailer is not verified

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use log::trace;
use std::io::Write;

/// Length of the zlib container header that precedes the raw DEFLATE body.
pub const HEADER_LEN: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum PasteError {
    #[error("paste code is empty")]
    Empty,

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload of {len} bytes is too short for a zlib header")]
    MissingHeader { len: usize },

    #[error("deflate decode error: {0}")]
    Inflate(String),

    #[error("deflate stream ended before its final block")]
    Truncated,

    #[error("decoded build is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("nothing to encode")]
    EmptyInput,

    #[error("deflate encode error: {0}")]
    Deflate(#[from] std::io::Error),
}

/// Coarse classification of [`PasteError`], used to report the failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteErrorKind {
    Format,
    Decompression,
    Encoding,
}

impl PasteError {
    pub fn kind(&self) -> PasteErrorKind {
        match self {
            PasteError::Empty
            | PasteError::Base64(_)
            | PasteError::MissingHeader { .. }
            | PasteError::Utf8(_) => PasteErrorKind::Format,
            PasteError::Inflate(_) | PasteError::Truncated => PasteErrorKind::Decompression,
            PasteError::EmptyInput | PasteError::Deflate(_) => PasteErrorKind::Encoding,
        }
    }
}

pub type PasteResult<T> = Result<T, PasteError>;

/// Decode a paste code into the build XML it carries.
pub fn decode(paste_code: &str) -> PasteResult<String> {
    let normalized = normalize_base64(paste_code);
    if normalized.is_empty() {
        return Err(PasteError::Empty);
    }
    let bytes = STANDARD.decode(normalized)?;
    if bytes.len() < HEADER_LEN {
        return Err(PasteError::MissingHeader { len: bytes.len() });
    }
    trace!(
        "paste code: {} base64 bytes, header {:02x?}",
        bytes.len(),
        &bytes[..HEADER_LEN]
    );
    let inflated = inflate_raw(&bytes[HEADER_LEN..])?;
    Ok(String::from_utf8(inflated)?)
}

/// Encode build XML as a URL-safe paste code.
///
/// The output is a complete zlib stream (header, best-compression body and
/// checksum) so it is also readable by tools that verify the trailer.
pub fn encode(xml: &str) -> PasteResult<String> {
    if xml.is_empty() {
        return Err(PasteError::EmptyInput);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(xml.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(URL_SAFE.encode(compressed))
}

/// Whether `paste_code` decodes cleanly.
pub fn is_valid(paste_code: &str) -> bool {
    decode(paste_code).is_ok()
}

/// Strip whitespace, map the URL-safe alphabet onto the standard one and
/// restore `=` padding to a multiple of four.
pub(crate) fn normalize_base64(input: &str) -> String {
    let mut out: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while out.len() % 4 != 0 {
        out.push('=');
    }
    out
}

fn inflate_raw(body: &[u8]) -> PasteResult<Vec<u8>> {
    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity(body.len().saturating_mul(4).max(1024));

    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity());
        }
        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();
        let status = inflater
            .decompress_vec(&body[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| PasteError::Inflate(e.to_string()))?;

        match status {
            Status::StreamEnd => {
                trace!("inflated {} bytes into {}", inflater.total_in(), out.len());
                return Ok(out);
            }
            Status::Ok | Status::BufError => {
                // No progress with output space left: the input ran out
                // before the final block.
                let stalled = inflater.total_in() as usize == consumed
                    && inflater.total_out() == produced;
                if stalled && out.len() < out.capacity() {
                    return Err(PasteError::Truncated);
                }
            }
        }
    }
}
