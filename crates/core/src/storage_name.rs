//! Generated blob names and client file name handling.
//!
//! Blobs are never stored under a client-supplied name. The client name is
//! kept only as a display attribute and contributes at most a sanitized
//! extension to the generated name.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Random bytes per storage name (encodes to 32 base64url characters).
pub const STORAGE_NAME_RANDOM_BYTES: usize = 24;

/// Longest extension carried over from the client file name.
pub const MAX_EXTENSION_LEN: usize = 16;

/// Longest display name kept from the client file name, in bytes.
pub const MAX_DISPLAY_NAME_LEN: usize = 255;

/// Source of storage names for new uploads.
pub trait StorageNameGenerator: Send + Sync {
    /// Produce a fresh relative blob name for a file the client called
    /// `original_name`.
    fn generate(&self, original_name: &str) -> String;
}

/// Generates names from the thread-local CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomNameGenerator;

impl StorageNameGenerator for RandomNameGenerator {
    fn generate(&self, original_name: &str) -> String {
        let mut bytes = [0u8; STORAGE_NAME_RANDOM_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let stem = URL_SAFE_NO_PAD.encode(bytes);
        match extension_of(original_name) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }
}

/// Extract a safe extension from a client file name.
///
/// Returns the part after the last dot of the base name, lowercased, when it
/// is 1..=16 ASCII alphanumerics. Anything else yields `None`.
pub fn extension_of(original_name: &str) -> Option<String> {
    let base = base_name(original_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Sanitize a client file name for display and `Content-Disposition`.
///
/// Directory components, quotes, backslashes, and control characters are
/// dropped. Returns `None` when nothing usable remains.
pub fn display_name(original_name: &str) -> Option<String> {
    let cleaned: String = base_name(original_name)
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    let mut end = cleaned.len().min(MAX_DISPLAY_NAME_LEN);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    Some(cleaned[..end].to_string())
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}
