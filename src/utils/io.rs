use anyhow::{bail, Result};
use std::path::Path;

/// Supported file formats for exported derivations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format
    Json,
    /// Text format
    Text,
}

impl OutputFormat {
    /// Parse a string to get the output format
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "txt" => Ok(Self::Text),
            _ => bail!("Unsupported output format: {}", s),
        }
    }
}

/// Get the file format from a file extension
pub fn format_from_extension(path: &Path) -> Result<OutputFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("json") => Ok(OutputFormat::Json),
        Some("txt") | Some("text") => Ok(OutputFormat::Text),
        _ => bail!("Unknown or missing file extension for path: {}", path.display()),
    }
}
