//! # custody-cli: Operator CLI for the Custody Stack
//!
//! Provides the `custody` command-line interface for work that needs no
//! running server.
//!
//! ## Subcommands
//!
//! - `custody extract-meta`: recover `(sku, serial)` from a document.
//! - `custody generate-serial`: fresh serial for a SKU.
//! - `custody resolve-cid`: normalize a CID reference to a gateway URL.
//! - `custody render-certificate`: render a certificate locally.
//!
//! ```bash
//! custody extract-meta sale-CL1000-CL8F2K.svg
//! custody resolve-cid ipfs://Qm... --gateway 'https://ipfs.io/ipfs/:cid'
//! custody render-certificate --sku CL1000 --serial CL8F2K -o cert.svg
//! ```
//!
//! Every `run_*` function writes its result to the given writer and
//! returns the process exit code.

pub mod cid;
pub mod document;
pub mod serial;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Read a file, or stdin when `path` is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
