//! # custody-docs: Document Generator
//!
//! Pure rendering of the artifacts the custody state machine uploads:
//!
//! | Artifact | Channel | Format | Renderer |
//! |----------|---------|--------|----------|
//! | Certificate of registration | public | SVG | [`render_certificate`] |
//! | Private hand-off document | private | SVG | [`render_handoff`] |
//! | Transfer cancellation notice | public | SVG | [`render_cancellation_notice`] |
//! | Chain attestation | public | text | [`render_attestation`] |
//!
//! Every SVG carries a `<!--META:{...}-->` comment holding the item's
//! `(sku, serial)` so a printed or re-uploaded copy can be traced back to
//! its item with [`extract_meta`].
//!
//! Renderers never read the clock or the environment: dates and URLs are
//! inputs, so identical inputs give identical bytes.

pub mod artifact;
pub mod attestation;
pub mod certificate;
pub mod error;
pub mod handoff;
pub mod meta;
pub mod notice;
mod svg;
pub mod xml;

pub use artifact::{content_type_for_filename, safe_component, ArtifactKind};
pub use attestation::{render_attestation, Attestation, AttestationInput, ChainEntry};
pub use certificate::{render_certificate, CertificateInput};
pub use error::DocumentError;
pub use handoff::{render_handoff, HandoffInput};
pub use meta::{extract_meta, ArtifactMeta};
pub use notice::{render_cancellation_notice, CancellationInput};
pub use xml::{escape_xml, wrap_text};
