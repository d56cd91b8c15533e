//! Import command - Best-effort batch import from a JSON file
//!
//! Rows that fail are reported and skipped; earlier rows stay committed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use lineage_core::{BatchImporter, ImportFile};

use super::{print_info, print_json, CommandContext};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file with a top-level `lineages` array
    file: PathBuf,

    /// Exit with an error if any row failed
    #[arg(long)]
    strict: bool,
}

pub fn execute(args: ImportArgs, ctx: &CommandContext) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let file = ImportFile::from_json(&content)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    let handles = ctx.open()?;
    let importer = BatchImporter::new(&handles.service, handles.cache.as_ref());
    let report = importer.import(&file.lineages);

    print_info(
        &format!(
            "Imported {} rows: {} created, {} updated, {} failed",
            report.rows,
            report.created,
            report.updated,
            report.errors.len()
        ),
        ctx.global.quiet,
    );
    print_json(&report)?;

    if args.strict && !report.is_clean() {
        anyhow::bail!("{} import row(s) failed", report.errors.len());
    }
    Ok(())
}
