use anyhow::{Context, Result};
use crate::grammar::engine::Grammar;
use crate::history::SavedDerivation;
use crate::io::display::{format_chain, format_numbered_rule, format_sentential};
use crate::io::snapshot::GrammarDocument;
use crate::utils::io::OutputFormat;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DerivationExport<'a> {
    grammar: GrammarDocument,
    derivations: &'a [SavedDerivation],
}

/// Export completed derivations to a file based on format
pub fn export_derivations(
    grammar: &Grammar,
    derivations: &[SavedDerivation],
    path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Json => export_derivations_json(grammar, derivations, &mut writer),
        OutputFormat::Text => export_derivations_text(grammar, derivations, &mut writer),
    }?;
    writer.flush().context("Failed to flush export")?;
    log::info!("Exported {} derivations to {}", derivations.len(), path.display());
    Ok(())
}

/// Export derivations to JSON format, together with the grammar they belong to
pub fn export_derivations_json<W: Write>(
    grammar: &Grammar,
    derivations: &[SavedDerivation],
    writer: &mut W,
) -> Result<()> {
    let export = DerivationExport {
        grammar: GrammarDocument::from(grammar),
        derivations,
    };
    serde_json::to_writer_pretty(&mut *writer, &export)
        .context("Failed to serialize derivations to JSON")?;
    writeln!(writer)?;
    Ok(())
}

/// Export derivations to text format
pub fn export_derivations_text<W: Write>(
    grammar: &Grammar,
    derivations: &[SavedDerivation],
    writer: &mut W,
) -> Result<()> {
    writeln!(writer, "== Rules ({} total) ==", grammar.rule_count())?;
    for (i, rule) in grammar.rules().iter().enumerate() {
        writeln!(writer, "{}", format_numbered_rule(i + 1, rule))?;
    }
    writeln!(writer)?;

    writeln!(writer, "== Derivations ({} total) ==", derivations.len())?;
    for (i, derivation) in derivations.iter().enumerate() {
        writeln!(
            writer,
            "{}. {} [{}]",
            i + 1,
            format_sentential(&derivation.final_word),
            derivation.timestamp.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(writer, "   {}", format_chain(&derivation.steps))?;
    }
    Ok(())
}
