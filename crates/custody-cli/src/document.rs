//! # Document Subcommands
//!
//! - `custody extract-meta <file>` prints the item a rendered document
//!   belongs to, as JSON.
//! - `custody render-certificate` renders a certificate locally without
//!   uploading it.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use custody_core::{text, ItemKey, Timestamp, MAX_TEXT_LEN};
use custody_docs::{extract_meta, render_certificate, CertificateInput};

use crate::read_input;

#[derive(Args, Debug)]
pub struct ExtractMetaArgs {
    /// Document to inspect, or `-` for stdin.
    pub file: PathBuf,
}

pub fn run_extract_meta(args: &ExtractMetaArgs, out: &mut dyn Write) -> Result<u8> {
    let document = read_input(&args.file)?;
    let meta = extract_meta(&document)
        .with_context(|| format!("no item metadata in {}", args.file.display()))?;

    tracing::info!(sku = %meta.sku, serial = %meta.serial, "metadata extracted");
    writeln!(out, "{}", serde_json::to_string_pretty(&meta)?)?;
    Ok(0)
}

#[derive(Args, Debug)]
pub struct RenderCertificateArgs {
    #[arg(long)]
    pub sku: String,

    #[arg(long)]
    pub serial: String,

    /// Item name.
    #[arg(long)]
    pub name: Option<String>,

    /// Item description, wrapped on the certificate.
    #[arg(long)]
    pub description: Option<String>,

    /// Owner printed on the certificate.
    #[arg(long)]
    pub owner: Option<String>,

    /// Verification URL. Defaults to `PUBLIC_VERIFY_URL`.
    #[arg(long)]
    pub verify_url: Option<String>,

    /// Issue date (RFC 3339). Defaults to now.
    #[arg(long)]
    pub issued_on: Option<String>,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run_render_certificate(args: &RenderCertificateArgs, out: &mut dyn Write) -> Result<u8> {
    let key = ItemKey::new(&args.sku, &args.serial)?;
    let name = text::optional("name", args.name.as_deref(), MAX_TEXT_LEN)?;
    let description = text::optional("description", args.description.as_deref(), MAX_TEXT_LEN)?;
    let owner = text::optional("owner", args.owner.as_deref(), MAX_TEXT_LEN)?;
    let issued_on = match &args.issued_on {
        Some(raw) => Timestamp::parse(raw)?,
        None => Timestamp::now(),
    };
    let verify_url = args
        .verify_url
        .clone()
        .or_else(|| std::env::var("PUBLIC_VERIFY_URL").ok())
        .filter(|u| !u.trim().is_empty());

    let svg = render_certificate(&CertificateInput {
        sku: key.sku(),
        serial: key.serial(),
        item_name: name.as_deref(),
        item_description: description.as_deref(),
        owner_name: owner.as_deref(),
        issued_on,
        verify_url: verify_url.as_deref(),
    });

    match &args.output {
        Some(path) => {
            std::fs::write(path, &svg).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "certificate written");
            writeln!(out, "{}", path.display())?;
        }
        None => out.write_all(svg.as_bytes())?,
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_args(output: Option<PathBuf>) -> RenderCertificateArgs {
        RenderCertificateArgs {
            sku: "SKU-1".into(),
            serial: "S-1".into(),
            name: Some("Field Watch".into()),
            description: None,
            owner: Some("Alice".into()),
            verify_url: Some("https://verify.example".into()),
            issued_on: Some("2026-03-01T12:00:00Z".into()),
            output,
        }
    }

    #[test]
    fn renders_to_stdout_and_extracts_back() {
        let mut svg = Vec::new();
        run_render_certificate(&render_args(None), &mut svg).unwrap();
        let svg = String::from_utf8(svg).unwrap();
        assert!(svg.contains("Field Watch"));
        assert!(svg.contains("Alice"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.svg");
        std::fs::write(&path, &svg).unwrap();

        let mut out = Vec::new();
        run_extract_meta(&ExtractMetaArgs { file: path }, &mut out).unwrap();
        let meta: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(meta["sku"], "SKU-1");
        assert_eq!(meta["serial"], "S-1");
    }

    #[test]
    fn rendering_is_deterministic_for_fixed_date() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        run_render_certificate(&render_args(None), &mut a).unwrap();
        run_render_certificate(&render_args(None), &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.svg");
        let mut out = Vec::new();
        run_render_certificate(&render_args(Some(path.clone())), &mut out).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
        assert_eq!(
            String::from_utf8(out).unwrap().trim(),
            path.display().to_string()
        );
    }

    #[test]
    fn blank_serial_is_rejected() {
        let mut args = render_args(None);
        args.serial = " ".into();
        assert!(run_render_certificate(&args, &mut Vec::new()).is_err());
    }

    #[test]
    fn document_without_metadata_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.svg");
        std::fs::write(&path, "<svg></svg>").unwrap();
        let err = run_extract_meta(&ExtractMetaArgs { file: path }, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("no item metadata"));
    }
}
