//! # Public Certificate of Registration
//!
//! Published on the public channel at item creation and again at every
//! claim. Carries the item's display metadata and, after a claim, the
//! current owner's name. Never carries a secret.

use custody_core::Timestamp;

use crate::svg::Sheet;
use crate::xml::wrap_text;

/// Title printed on every certificate.
pub const CERTIFICATE_TITLE: &str = "Certificate of Registration";

/// Description wrap width, in characters.
pub const DESCRIPTION_WRAP: usize = 30;

/// Descriptions are cut after this many wrapped lines.
const MAX_DESCRIPTION_LINES: usize = 12;

/// Inputs for [`render_certificate`].
#[derive(Debug, Clone)]
pub struct CertificateInput<'a> {
    pub sku: &'a str,
    pub serial: &'a str,
    pub item_name: Option<&'a str>,
    pub item_description: Option<&'a str>,
    /// Claimant name; `None` for the issuance certificate.
    pub owner_name: Option<&'a str>,
    pub issued_on: Timestamp,
    /// Where holders can look the item up.
    pub verify_url: Option<&'a str>,
}

/// Render a public certificate as SVG.
pub fn render_certificate(input: &CertificateInput<'_>) -> String {
    let mut description = wrap_text(input.item_description.unwrap_or_default(), DESCRIPTION_WRAP);
    if description.len() > MAX_DESCRIPTION_LINES {
        description.truncate(MAX_DESCRIPTION_LINES);
        if let Some(last) = description.last_mut() {
            last.push('…');
        }
    }

    let mut sheet = Sheet::new();
    sheet
        .field("SKU", input.sku)
        .field("Serial", input.serial)
        .field("Item Name", input.item_name.unwrap_or_default())
        .block("Description", &description)
        .field("Owner", input.owner_name.unwrap_or_default())
        .field("Issued", &input.issued_on.to_short_date())
        .field("Verify", input.verify_url.unwrap_or_default())
        .note("Public registration certificate. This document proves the registration event only; it grants no control over the item.");
    sheet.finish(input.sku, input.serial, CERTIFICATE_TITLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::extract_meta;

    fn input<'a>() -> CertificateInput<'a> {
        CertificateInput {
            sku: "SKU1",
            serial: "S1",
            item_name: Some("Walnut Chair"),
            item_description: Some("Hand-made <limited> edition & signed"),
            owner_name: Some("Alice"),
            issued_on: Timestamp::parse("2026-03-07T10:00:00Z").unwrap(),
            verify_url: Some("https://verify.example"),
        }
    }

    #[test]
    fn certificate_contains_fields_and_title() {
        let svg = render_certificate(&input());
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains(CERTIFICATE_TITLE));
        assert!(svg.contains("Walnut Chair"));
        assert!(svg.contains("Alice"));
        assert!(svg.contains("3/7/2026"));
        assert!(svg.contains("https://verify.example"));
    }

    #[test]
    fn certificate_escapes_values() {
        let svg = render_certificate(&input());
        assert!(svg.contains("&lt;limited&gt;"));
        assert!(svg.contains("&amp; signed"));
        assert!(!svg.contains("<limited>"));
    }

    #[test]
    fn certificate_is_well_formed_with_control_characters_in_input() {
        let mut i = input();
        i.item_name = Some("Wat\u{1}ch");
        i.owner_name = Some("Bo\u{b}b");
        let svg = render_certificate(&i);
        assert!(svg.contains("Watch"));
        assert!(svg.contains("Bob"));
        assert!(!svg
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r')));
    }

    #[test]
    fn certificate_carries_item_meta() {
        let meta = extract_meta(&render_certificate(&input())).unwrap();
        assert_eq!(meta.sku, "SKU1");
        assert_eq!(meta.serial, "S1");
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render_certificate(&input()), render_certificate(&input()));
    }

    #[test]
    fn long_descriptions_are_cut() {
        let long = "word ".repeat(400);
        let mut i = input();
        i.item_description = Some(&long);
        let svg = render_certificate(&i);
        assert_eq!(svg.matches("<tspan").count(), MAX_DESCRIPTION_LINES);
        assert!(svg.contains('…'));
    }
}
