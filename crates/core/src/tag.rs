//! Tag normalization shared by uploads and listing filters.

use crate::error::{Error, Result};

/// Maximum number of tags attached to one file or one filter.
pub const MAX_TAGS: usize = 64;

/// Maximum length of a single tag in bytes.
pub const MAX_TAG_LEN: usize = 256;

/// Trim, validate, and deduplicate tags, keeping first-seen order.
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for raw in tags {
        let tag = raw.trim();
        if tag.is_empty() {
            return Err(Error::InvalidTag("tag must not be empty".to_string()));
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(Error::InvalidTag(format!(
                "tag exceeds {MAX_TAG_LEN} bytes"
            )));
        }
        if tag.chars().any(char::is_control) {
            return Err(Error::InvalidTag(
                "tag contains control characters".to_string(),
            ));
        }
        if out.iter().any(|existing| existing == tag) {
            continue;
        }
        if out.len() == MAX_TAGS {
            return Err(Error::InvalidTag(format!("more than {MAX_TAGS} tags")));
        }
        out.push(tag.to_string());
    }
    Ok(out)
}
