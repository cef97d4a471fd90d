// Statement Parser - Format dispatch and the ingestion pipeline
//
// Pipeline:
//   detect format → StatementParser (OFX/QFX/CSV) → normalize descriptions
//   → categorize → validate → ParseResult
//
// Adding a format = implement StatementParser + one arm in get_parser().

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::categorizer::{normalize_description, CategorizationSummary, TransactionCategorizer};
use crate::config::{EngineConfig, ParseOptions};
use crate::csv_parser::CsvParser;
use crate::error::Result;
use crate::format::detect_format;
use crate::model::{BankStatementData, BankTransaction, StatementFormat};
use crate::ofx::OfxParser;
use crate::validator::BankStatementValidator;

// ============================================================================
// CORE TRAIT
// ============================================================================

/// Turns raw file content into a canonical statement.
///
/// Implementations only parse; categorization and validation happen in
/// `BankStatementParser` so every format gets the same treatment.
pub trait StatementParser: Send + Sync {
    fn parse(&self, content: &str, file_name: &str, options: &ParseOptions) -> Result<BankStatementData>;

    /// The format this parser reports on its statements
    fn format(&self) -> StatementFormat;

    /// Parser version (logged with each parse)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Get parser for a detected format
pub fn get_parser(format: StatementFormat) -> Box<dyn StatementParser> {
    match format {
        StatementFormat::Ofx => Box::new(OfxParser::new()),
        StatementFormat::Qfx => Box::new(OfxParser::qfx()),
        StatementFormat::Csv => Box::new(CsvParser::new()),
    }
}

// ============================================================================
// PARSE RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub statement: BankStatementData,

    /// Format that parsed the file: "OFX", "QFX" or "CSV"
    pub parser_used: String,

    pub processing_time_ms: f64,

    /// Present when auto-categorization ran
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub categorization: Option<CategorizationSummary>,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct BankStatementParser {
    categorizer: TransactionCategorizer,
    validator: BankStatementValidator,
}

impl BankStatementParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        Ok(BankStatementParser {
            categorizer: TransactionCategorizer::with_config(config.categorizer)?,
            validator: BankStatementValidator::with_config(config.validator),
        })
    }

    /// Swap in a categorizer carrying custom rules
    pub fn with_categorizer(mut self, categorizer: TransactionCategorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn categorizer(&self) -> &TransactionCategorizer {
        &self.categorizer
    }

    pub fn categorizer_mut(&mut self) -> &mut TransactionCategorizer {
        &mut self.categorizer
    }

    pub fn validator(&self) -> &BankStatementValidator {
        &self.validator
    }

    pub fn parse(&self, content: &str, file_name: &str, options: &ParseOptions) -> Result<ParseResult> {
        self.run(content, file_name, options, None)
    }

    /// Same as `parse`, also flagging transactions already in `existing`
    pub fn parse_with_history(
        &self,
        content: &str,
        file_name: &str,
        options: &ParseOptions,
        existing: &[BankTransaction],
    ) -> Result<ParseResult> {
        self.run(content, file_name, options, Some(existing))
    }

    fn run(
        &self,
        content: &str,
        file_name: &str,
        options: &ParseOptions,
        existing: Option<&[BankTransaction]>,
    ) -> Result<ParseResult> {
        let started = Instant::now();
        options.check()?;

        // 1. Detect and dispatch (fail fast on unknown content)
        let format = detect_format(content, file_name)?;
        let parser = get_parser(format);
        let mut statement = parser.parse(content, file_name, options)?;

        // 2. Normalize
        if options.normalize_descriptions {
            for tx in statement.transactions.iter_mut() {
                tx.normalized_description = Some(normalize_description(&tx.description));
            }
        }

        // 3. Categorize
        let categorization = if options.auto_categorize {
            Some(self.categorizer.categorize_all(&mut statement.transactions)?)
        } else {
            None
        };

        // 4. Validate
        if options.validate_balance {
            let report = match existing {
                Some(history) => self.validator.validate_with_history(&statement, history),
                None => self.validator.validate(&statement),
            };
            report.attach_to(&mut statement);
        }

        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        tracing::info!(
            "Parsed '{}' as {} (parser v{}): {} transactions, valid={}, {} warnings in {:.2}ms",
            file_name,
            format,
            parser.version(),
            statement.transaction_count(),
            statement.is_valid,
            statement.validation_warnings.len(),
            processing_time_ms
        );

        Ok(ParseResult {
            statement,
            parser_used: parser.format().as_str().to_string(),
            processing_time_ms,
            categorization,
        })
    }

    pub fn supported_formats() -> &'static [StatementFormat] {
        &[StatementFormat::Ofx, StatementFormat::Qfx, StatementFormat::Csv]
    }

    /// Case-insensitive ("ofx", "QFX", "Csv")
    pub fn is_format_supported(format: &str) -> bool {
        StatementFormat::from_name(format)
            .map(|f| Self::supported_formats().contains(&f))
            .unwrap_or(false)
    }
}

// ============================================================================
// TESTS
// ============================================================================
