//! # Embedded Item Metadata
//!
//! Rendered SVGs carry the item identity in an XML comment:
//!
//! ```text
//! <!--META:{"serial":"S1","sku":"SKU1"}-->
//! ```
//!
//! XML comments may not contain `--`, so every `-` in the JSON payload is
//! written as the JSON escape `\u002d`. A JSON parser undoes the escape,
//! which makes extraction exact for any sku/serial. Documents from older
//! deployments wrote `--` as `- -`; those still parse, with the spaced
//! form returned as written.

use serde::{Deserialize, Serialize};

const META_OPEN: &str = "<!--META:";
const META_CLOSE: &str = "-->";

/// Item identity recovered from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub sku: String,
    pub serial: String,
}

/// Render the metadata comment for an item.
pub fn embed_meta(sku: &str, serial: &str) -> String {
    let payload = serde_json::json!({ "sku": sku, "serial": serial }).to_string();
    format!("{META_OPEN}{}{META_CLOSE}", payload.replace('-', "\\u002d"))
}

/// Recover `(sku, serial)` from the first metadata comment in `document`.
///
/// Returns `None` when no comment is present or its payload is not the
/// expected JSON object.
pub fn extract_meta(document: &str) -> Option<ArtifactMeta> {
    let start = document.find(META_OPEN)? + META_OPEN.len();
    let len = document[start..].find(META_CLOSE)?;
    let payload = &document[start..start + len];

    serde_json::from_str(payload).ok()
}
