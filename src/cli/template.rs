use crate::core::Ticker;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

/// Writes an overrides CSV listing every ticker with a zero share count.
pub fn write_template<W: Write>(tickers: &[Ticker], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["ticker", "shares_outstanding"])?;
    for ticker in tickers {
        csv.write_record([ticker.as_str(), "0"])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn run(tickers: &[Ticker], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if path.exists() {
                anyhow::bail!("Overrides file already exists at {}", path.display());
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_template(tickers, file)?;
            info!("Wrote overrides template to {}", path.display());
        }
        None => write_template(tickers, io::stdout().lock())?,
    }
    Ok(())
}
