//! `mailpress` - renders a JSON message manifest as a MIME message.
//!
//! Usage: `mailpress <manifest.json> [output.eml]`
//!
//! The message is written to `output.eml`, or to stdout when no output path
//! is given. Logging goes to stderr and is controlled with `RUST_LOG`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod manifest;

use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manifest::Manifest;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailpress=info,mailpress_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut args = std::env::args_os().skip(1);
    let Some(manifest_path) = args.next().map(PathBuf::from) else {
        bail!("usage: mailpress <manifest.json> [output.eml]");
    };
    let output = args.next().map(PathBuf::from);

    let text = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let mut message = Manifest::from_json(&text)?.into_message(base)?;

    let exported = message.export().context("export failed")?;
    let written = match &output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            exported.write_to(BufWriter::new(file))?
        }
        None => exported.write_to(io::stdout().lock())?,
    };

    info!(bytes = written, manifest = %manifest_path.display(), "message exported");
    message.reset();
    Ok(())
}
