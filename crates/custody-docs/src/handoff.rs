//! # Private Hand-off Document
//!
//! Carries the live secret to whoever is meant to claim the item next.
//! Uploaded on the private channel at creation and at transfer
//! initiation; rendered locally (not uploaded) after a first claim.

use custody_core::Timestamp;

use crate::svg::Sheet;

/// Title printed on every hand-off document.
pub const HANDOFF_TITLE: &str = "Private Hand-off Document";

/// Inputs for [`render_handoff`].
#[derive(Debug, Clone)]
pub struct HandoffInput<'a> {
    pub sku: &'a str,
    pub serial: &'a str,
    /// Intended recipient, if the current holder named one.
    pub owner_name: Option<&'a str>,
    /// Plaintext secret of the live credential.
    pub secret: &'a str,
    pub issued_on: Timestamp,
    pub verify_url: Option<&'a str>,
}

/// Render a hand-off document as SVG.
pub fn render_handoff(input: &HandoffInput<'_>) -> String {
    let mut sheet = Sheet::new();
    sheet
        .field("SKU", input.sku)
        .field("Serial", input.serial)
        .field("New Owner", input.owner_name.unwrap_or_default())
        .field("Registration Secret", input.secret)
        .note("Keep this document private. Anyone holding the registration secret can claim this item. To register ownership, look the item up by SKU and serial and submit a claim with the secret above; the claim issues a new secret for the next transfer.")
        .field("Issued", &input.issued_on.to_short_date())
        .field("Register", input.verify_url.unwrap_or_default());
    sheet.finish(input.sku, input.serial, HANDOFF_TITLE)
}
