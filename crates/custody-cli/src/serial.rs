//! `custody generate-serial`: fresh serial numbers.

use std::io::Write;

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

/// SKU used when neither `--sku`, `SINGLE_SKU` nor `DEFAULT_SKU` is set.
pub const FALLBACK_SKU: &str = "CL1000";

#[derive(Args, Debug)]
pub struct GenerateSerialArgs {
    /// SKU to pair the serial with. Defaults to `SINGLE_SKU`, then
    /// `DEFAULT_SKU`.
    #[arg(long)]
    pub sku: Option<String>,

    /// How many serials to generate.
    #[arg(long, short = 'n', default_value_t = 1)]
    pub count: u32,
}

#[derive(Debug, Serialize)]
struct Generated<'a> {
    sku: &'a str,
    serial: String,
}

pub fn run_generate_serial(args: &GenerateSerialArgs, out: &mut dyn Write) -> Result<u8> {
    if args.count == 0 {
        bail!("--count must be at least 1");
    }
    let sku = args
        .sku
        .clone()
        .or_else(|| env_sku("SINGLE_SKU"))
        .or_else(|| env_sku("DEFAULT_SKU"))
        .unwrap_or_else(|| FALLBACK_SKU.to_string());
    let sku = sku.trim();
    if sku.is_empty() {
        bail!("--sku must not be empty");
    }

    for _ in 0..args.count {
        let line = serde_json::to_string(&Generated {
            sku,
            serial: custody_crypto::generate_serial(),
        })?;
        writeln!(out, "{line}")?;
    }
    Ok(0)
}

fn env_sku(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
