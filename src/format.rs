// 🔎 Format Detection - decide which parser gets the file
//
// Strategy:
// 1. A specific extension (.ofx, .qfx, .csv) always wins
// 2. Generic or missing extension (.txt, none): sniff the content
// 3. Neither → UnsupportedFormat

use crate::error::{Result, StatementError};
use crate::model::StatementFormat;

/// Delimiters tried while sniffing, in priority order
pub const CSV_DELIMITERS: [char; 3] = [';', ',', '\t'];

/// How many non-empty lines the CSV sniffer looks at
const SNIFF_LINES: usize = 5;

/// Classify raw statement content.
///
/// ```text
/// detect_format("...", "extrato.ofx")  → OFX (content ignored)
/// detect_format("<OFX>...", "extrato.txt") → OFX
/// detect_format("a;b;c\n1;2;3", "extrato.txt") → CSV
/// ```
pub fn detect_format(content: &str, file_name: &str) -> Result<StatementFormat> {
    if let Some(format) = format_from_extension(file_name) {
        tracing::debug!("Detected {} from extension of '{}'", format, file_name);
        return Ok(format);
    }

    if looks_like_ofx(content) {
        tracing::debug!("Detected OFX by content in '{}'", file_name);
        return Ok(StatementFormat::Ofx);
    }

    if looks_like_csv(content) {
        tracing::debug!("Detected CSV by content in '{}'", file_name);
        return Ok(StatementFormat::Csv);
    }

    Err(StatementError::unsupported(
        file_name,
        "content is neither OFX/QFX nor delimited text",
    ))
}

/// Format implied by a specific file extension, if any
pub fn format_from_extension(file_name: &str) -> Option<StatementFormat> {
    let (_, extension) = file_name.trim().rsplit_once('.')?;

    match extension.to_ascii_lowercase().as_str() {
        "ofx" => Some(StatementFormat::Ofx),
        "qfx" => Some(StatementFormat::Qfx),
        "csv" => Some(StatementFormat::Csv),
        _ => None,
    }
}

/// Content contains an `<OFX` opening tag (any case)
pub fn looks_like_ofx(content: &str) -> bool {
    content.to_ascii_uppercase().contains("<OFX")
}

/// At least two of the first non-empty lines split into the same number
/// (≥ 3) of columns on one delimiter. A preamble line may precede them.
pub fn looks_like_csv(content: &str) -> bool {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(SNIFF_LINES)
        .collect();

    if lines.len() < 2 {
        return false;
    }

    CSV_DELIMITERS.iter().any(|&delimiter| {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.split(delimiter).count())
            .collect();

        counts
            .iter()
            .any(|&c| c >= 3 && counts.iter().filter(|&&n| n == c).count() >= 2)
    })
}
