// Bank Statement Engine - Core Library
// Exposes all modules for use in the CLI, the ERP import workflow, and tests

pub mod amount;
pub mod categorizer;    // Transaction categorization (rule table + payee extraction)
pub mod config;
pub mod csv_parser;     // Itaú / Bradesco / Banco do Brasil / generic CSV exports
pub mod deduplication;
pub mod documents;      // CNPJ / CPF / bank account checks
pub mod entities;
pub mod error;
pub mod format;
pub mod layouts;
pub mod model;
pub mod ofx;            // OFX 1.x SGML, OFX 2.x XML, QFX
pub mod parser;         // Orchestrator: detect → parse → categorize → validate
pub mod reconciliation;
pub mod rules;
pub mod summary;
pub mod text;
pub mod validator;

// Re-export commonly used types
pub use model::{
    AccountType, Balance, BankAccountInfo, BankStatementData, BankTransaction, Period,
    ReconciliationStatus, StatementFormat, Summary, TransactionCategory, TransactionDirection,
    TransactionType, TypeTotals, ValidationCode, ValidationIssue,
};
pub use error::{Result, StatementError};
pub use config::{AccountHint, CategorizerConfig, EngineConfig, ParseOptions, ValidatorConfig};
pub use format::detect_format;
pub use parser::{get_parser, BankStatementParser, ParseResult, StatementParser};
pub use ofx::OfxParser;
pub use csv_parser::CsvParser;
pub use categorizer::{
    CategorizationResult, CategorizationSummary, TransactionCategorizer,
    extract_payee_from_description, normalize_description,
};
pub use rules::{CategorizationRule, RuleEngine};
pub use validator::{BankStatementValidator, ValidationReport};
pub use documents::{validate_brazilian_account, validate_cnpj, validate_cpf, validate_document};
pub use deduplication::{DeduplicationEngine, DuplicateCheckResult, DuplicateMatch, MatchStrategy};
pub use reconciliation::{ReconciliationEngine, ReconciliationReport, ReconciliationResult};
pub use entities::{Bank, BankRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
