//! `custody resolve-cid`: normalize a content reference.
//!
//! Accepts `ipfs://<cid>`, any URL containing `/ipfs/<cid>`, or a bare CID,
//! and prints the gateway URL.

use std::io::Write;

use anyhow::{bail, Result};
use clap::Args;
use custody_core::ContentId;
use custody_notary_client::config::gateway_template_from_env;

#[derive(Args, Debug)]
pub struct ResolveCidArgs {
    /// Reference to resolve.
    pub input: String,

    /// Gateway template containing `:cid`. Defaults to `IPFS_GATEWAY`.
    #[arg(long)]
    pub gateway: Option<String>,

    /// Also print whether the artifact proxy would accept the CID.
    #[arg(long)]
    pub check_proxy: bool,
}

pub fn run_resolve_cid(args: &ResolveCidArgs, out: &mut dyn Write) -> Result<u8> {
    let Some(cid) = ContentId::extract(&args.input) else {
        bail!("no content id found in '{}'", args.input.trim());
    };
    let template = args
        .gateway
        .clone()
        .unwrap_or_else(gateway_template_from_env);
    if !template.contains(":cid") {
        bail!("gateway template must contain ':cid'");
    }

    tracing::debug!(cid = %cid, "resolved content id");
    writeln!(out, "{}", cid.resolve(&template))?;
    if args.check_proxy {
        writeln!(out, "proxyable: {}", cid.is_proxyable())?;
    }
    Ok(0)
}
