// ⚙️ Configuration - per-call parse options and engine-wide thresholds
//
// ParseOptions travel with each file; EngineConfig is loaded once (JSON) and
// shapes the categorizer and validator.

use anyhow::{Context as AnyhowContext, Result as AnyhowResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, StatementError};
use crate::rules::CategorizationRule;

/// Date pattern used when the caller does not supply one
pub const DEFAULT_CSV_DATE_FORMAT: &str = "%d/%m/%Y";

/// Categories at or below this confidence are flagged for review
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Confidence given to the `OTHER` fallback
pub const DEFAULT_CONFIDENCE: f64 = 0.3;

/// Statements spanning more days than this get a LONG_PERIOD warning
pub const LONG_PERIOD_DAYS: i64 = 365;

// ============================================================================
// PARSE OPTIONS
// ============================================================================

/// Account details for CSV exports, which rarely carry them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountHint {
    pub bank_code: Option<String>,
    pub branch_code: Option<String>,
    pub account_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseOptions {
    pub csv_delimiter: Option<char>,
    pub csv_date_format: Option<String>,
    pub normalize_descriptions: bool,
    pub auto_categorize: bool,
    pub validate_balance: bool,
    pub account: Option<AccountHint>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            csv_delimiter: None,
            csv_date_format: None,
            normalize_descriptions: false,
            auto_categorize: true,
            validate_balance: true,
            account: None,
        }
    }
}

impl ParseOptions {
    /// Reject options no parser could honour
    pub fn check(&self) -> Result<()> {
        if let Some(delimiter) = self.csv_delimiter {
            if delimiter.is_alphanumeric() || matches!(delimiter, '"' | '\n' | '\r') {
                return Err(StatementError::InvalidOptions(format!(
                    "'{}' cannot be used as a CSV delimiter",
                    delimiter.escape_default()
                )));
            }
            if !delimiter.is_ascii() {
                return Err(StatementError::InvalidOptions(format!(
                    "CSV delimiter must be a single-byte character, got '{}'",
                    delimiter
                )));
            }
        }

        if let Some(format) = &self.csv_date_format {
            if format.trim().is_empty() {
                return Err(StatementError::InvalidOptions(
                    "CSV date format cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// The CSV date pattern in chrono syntax
    pub fn chrono_date_format(&self) -> String {
        self.csv_date_format
            .as_deref()
            .map(to_chrono_format)
            .unwrap_or_else(|| DEFAULT_CSV_DATE_FORMAT.to_string())
    }
}

/// Accept "DD/MM/YYYY"-style token patterns as well as chrono patterns
pub fn to_chrono_format(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }

    format
        .replace("YYYY", "%Y")
        .replace("YY", "%y")
        .replace("MM", "%m")
        .replace("DD", "%d")
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Accepted difference between computed and declared closing balance
    pub balance_tolerance: Decimal,
    pub long_period_days: i64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            balance_tolerance: Decimal::new(1, 2),
            long_period_days: LONG_PERIOD_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizerConfig {
    pub low_confidence_threshold: f64,
    pub default_confidence: f64,
    /// Caller rules merged with the built-in table
    pub custom_rules: Vec<CategorizationRule>,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        CategorizerConfig {
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
            default_confidence: DEFAULT_CONFIDENCE,
            custom_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validator: ValidatorConfig,
    pub categorizer: CategorizerConfig,
}

impl EngineConfig {
    /// Load config from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AnyhowResult<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EngineConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert!(options.auto_categorize);
        assert!(options.validate_balance);
        assert!(!options.normalize_descriptions);
        assert_eq!(options.chrono_date_format(), "%d/%m/%Y");
    }

    #[test]
    fn test_options_from_camel_case_json() {
        let options: ParseOptions =
            serde_json::from_str(r#"{"csvDelimiter": ";", "autoCategorize": false}"#).unwrap();

        assert_eq!(options.csv_delimiter, Some(';'));
        assert!(!options.auto_categorize);
        assert!(options.validate_balance);
    }

    #[test]
    fn test_token_date_formats() {
        assert_eq!(to_chrono_format("DD/MM/YYYY"), "%d/%m/%Y");
        assert_eq!(to_chrono_format("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(to_chrono_format("DD/MM/YY"), "%d/%m/%y");
        assert_eq!(to_chrono_format("%d.%m.%Y"), "%d.%m.%Y");
    }

    #[test]
    fn test_invalid_delimiter_rejected() {
        let options = ParseOptions {
            csv_delimiter: Some('a'),
            ..ParseOptions::default()
        };
        assert!(matches!(options.check(), Err(StatementError::InvalidOptions(_))));

        let options = ParseOptions {
            csv_delimiter: Some('|'),
            ..ParseOptions::default()
        };
        assert!(options.check().is_ok());
    }

    #[test]
    fn test_engine_config_defaults_fill_missing_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"validator": {"long_period_days": 90}}"#).unwrap();

        assert_eq!(config.validator.long_period_days, 90);
        assert_eq!(config.validator.balance_tolerance, dec!(0.01));
        assert_eq!(config.categorizer.low_confidence_threshold, LOW_CONFIDENCE_THRESHOLD);
    }
}
