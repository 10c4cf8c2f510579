//! # Chain Attestation
//!
//! A plain-text, dated snapshot of an item's full ownership chain with one
//! event marked as the subject. The layout is:
//!
//! ```text
//! CUSTODY CHAIN ATTESTATION
//! item: SKU1/S1
//! target: event:<uuid>
//!
//! ---- BEGIN CHAIN ----
//! >> 1 event:<uuid> | Alice | 2026-01-02T00:00:00Z | cid:Qm... | disputed:no
//!    2 event:<uuid> | Bob | 2026-02-03T00:00:00Z | cid:Qm... | disputed:fraud
//! ---- END CHAIN ----
//!
//! chain-sha256: <hex>
//! passphrase: <passphrase>
//! issued-at: 2026-03-04T05:06:07Z
//! ```
//!
//! Fields on a chain line are separated by `|`; a literal `|` or `\` in a
//! claimant name is written with a leading backslash.
//!
//! The chain block and its digest depend only on the events, so repeated
//! attestations over an unchanged chain agree byte for byte there. The
//! issuance time and passphrase sit outside the hashed block.

use custody_core::{DisputeReason, EventId, ItemKey, Timestamp};
use custody_crypto::sha256_hex;

use crate::error::DocumentError;

const HEADER: &str = "CUSTODY CHAIN ATTESTATION";
const BEGIN: &str = "---- BEGIN CHAIN ----";
const END: &str = "---- END CHAIN ----";
const TARGET_MARK: &str = ">> ";
const PLAIN_MARK: &str = "   ";

/// One ownership event as it appears in the chain block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub event_id: EventId,
    pub claimant: String,
    pub claimed_at: Timestamp,
    pub certificate_cid: Option<String>,
    pub disputed: bool,
    pub dispute_reason: Option<DisputeReason>,
}

/// Inputs for [`render_attestation`]. `chain` must be in creation order.
#[derive(Debug, Clone)]
pub struct AttestationInput<'a> {
    pub item: &'a ItemKey,
    pub chain: &'a [ChainEntry],
    pub target: EventId,
    pub passphrase: &'a str,
    pub issued_at: Timestamp,
}

/// Rendered attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    /// Full text to upload.
    pub text: String,
    /// The hashed part of `text`.
    pub chain_block: String,
    /// Hex SHA-256 of `chain_block`.
    pub chain_digest: String,
}

/// Render an attestation. Fails when `target` is not in `chain`.
pub fn render_attestation(input: &AttestationInput<'_>) -> Result<Attestation, DocumentError> {
    if !input.chain.iter().any(|e| e.event_id == input.target) {
        return Err(DocumentError::TargetNotInChain(input.target));
    }

    let chain_block = chain_block(input.chain, input.target);
    let chain_digest = sha256_hex(chain_block.as_bytes());

    let mut text = String::with_capacity(chain_block.len() + 256);
    text.push_str(HEADER);
    text.push('\n');
    text.push_str(&format!("item: {}\n", input.item));
    text.push_str(&format!("target: {}\n\n", input.target));
    text.push_str(&chain_block);
    text.push('\n');
    text.push_str(&format!("chain-sha256: {chain_digest}\n"));
    text.push_str(&format!("passphrase: {}\n", single_line(input.passphrase)));
    text.push_str(&format!("issued-at: {}\n", input.issued_at.to_iso8601()));

    Ok(Attestation {
        text,
        chain_block,
        chain_digest,
    })
}

fn chain_block(chain: &[ChainEntry], target: EventId) -> String {
    let mut block = String::new();
    block.push_str(BEGIN);
    block.push('\n');
    for (index, entry) in chain.iter().enumerate() {
        let mark = if entry.event_id == target {
            TARGET_MARK
        } else {
            PLAIN_MARK
        };
        let disputed = match (entry.disputed, entry.dispute_reason) {
            (false, _) => "no".to_string(),
            (true, Some(reason)) => reason.as_str().to_string(),
            (true, None) => "yes".to_string(),
        };
        block.push_str(&format!(
            "{mark}{} {} | {} | {} | cid:{} | disputed:{disputed}\n",
            index + 1,
            entry.event_id,
            chain_field(&entry.claimant),
            entry.claimed_at.to_iso8601(),
            entry.certificate_cid.as_deref().map_or_else(|| "-".to_string(), chain_field),
        ));
    }
    block.push_str(END);
    block.push('\n');
    block
}

// Free text must not be able to forge extra lines.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

// A chain line splits on unescaped `|`, so free text inside it escapes
// `\` and `|` with a backslash.
fn chain_field(value: &str) -> String {
    single_line(value).replace('\\', "\\\\").replace('|', "\\|")
}
