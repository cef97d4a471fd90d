// ✅ Bank Statement Validator - structural and business checks
//
// Errors make a statement invalid; warnings are attached for review but the
// statement stays usable. Nothing here panics or rejects input: problems are
// always reported as ValidationIssue values.
//
// Errors:   INVALID_PERIOD, MISSING_ACCOUNT_NUMBER, DIRECTION_MISMATCH
// Warnings: NO_TRANSACTIONS, LONG_PERIOD, BALANCE_MISMATCH, DUPLICATE_TRANSACTION,
//           EXTERNAL_DUPLICATE, TRANSACTION_OUT_OF_PERIOD, INVALID_BANK_ACCOUNT,
//           INVALID_PAYEE_DOCUMENT

use serde::{Deserialize, Serialize};

use crate::config::ValidatorConfig;
use crate::deduplication::{DeduplicationEngine, DuplicateCheckResult};
use crate::documents::{validate_brazilian_account, validate_document};
use crate::model::{BankStatementData, BankTransaction, ValidationCode, ValidationIssue};
use crate::reconciliation::{ReconciliationEngine, ReconciliationResult};

pub use crate::documents::{validate_cnpj, validate_cpf, DocumentKind};

// ============================================================================
// VALIDATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn new() -> Self {
        ValidationReport {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, issue: ValidationIssue) {
        self.is_valid = false;
        self.errors.push(issue);
    }

    fn warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    pub fn has_code(&self, code: ValidationCode) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|issue| issue.code == code)
    }

    pub fn count(&self, code: ValidationCode) -> usize {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(|issue| issue.code == code)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ({} errors, {} warnings)",
            if self.is_valid { "valid" } else { "invalid" },
            self.errors.len(),
            self.warnings.len()
        )
    }

    /// Copy the outcome onto the statement
    pub fn attach_to(self, statement: &mut BankStatementData) {
        statement.is_valid = self.is_valid;
        statement.validation_errors = self.errors;
        statement.validation_warnings = self.warnings;
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct BankStatementValidator {
    config: ValidatorConfig,
    dedup: DeduplicationEngine,
}

impl BankStatementValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        BankStatementValidator {
            config,
            dedup: DeduplicationEngine::new(),
        }
    }

    pub fn validate(&self, statement: &BankStatementData) -> ValidationReport {
        let mut report = ValidationReport::new();

        let period_ok = self.check_period(statement, &mut report);
        self.check_account(statement, &mut report);

        if statement.transactions.is_empty() {
            report.warning(
                ValidationIssue::new(ValidationCode::NoTransactions, "Statement has no transactions")
                    .on_field("transactions"),
            );
        }

        self.check_balance(statement, &mut report);
        self.check_transactions(statement, period_ok, &mut report);

        let internal = self.check_internal_duplicates(&statement.transactions);
        for dup in internal.duplicates {
            report.warning(
                ValidationIssue::new(ValidationCode::DuplicateTransaction, dup.reason)
                    .on_transaction(dup.index),
            );
        }

        tracing::debug!("Validated '{}': {}", statement.file_name, report.summary());
        report
    }

    /// `validate` plus duplicates against previously imported transactions
    pub fn validate_with_history(
        &self,
        statement: &BankStatementData,
        existing: &[BankTransaction],
    ) -> ValidationReport {
        let mut report = self.validate(statement);

        let external = self.check_external_duplicates(&statement.transactions, existing);
        for dup in external.duplicates {
            report.warning(
                ValidationIssue::new(ValidationCode::ExternalDuplicate, dup.reason)
                    .on_transaction(dup.index),
            );
        }

        report
    }

    pub fn check_internal_duplicates(&self, transactions: &[BankTransaction]) -> DuplicateCheckResult {
        self.dedup.check_internal_duplicates(transactions)
    }

    pub fn check_external_duplicates(
        &self,
        transactions: &[BankTransaction],
        existing: &[BankTransaction],
    ) -> DuplicateCheckResult {
        self.dedup.check_external_duplicates(transactions, existing)
    }

    /// Returns whether the period is usable for per-transaction checks
    fn check_period(&self, statement: &BankStatementData, report: &mut ValidationReport) -> bool {
        let period = &statement.period;

        if period.start_date > period.end_date {
            report.error(
                ValidationIssue::new(
                    ValidationCode::InvalidPeriod,
                    format!(
                        "Period start {} is after end {}",
                        period.start_date, period.end_date
                    ),
                )
                .on_field("period"),
            );
            return false;
        }

        if period.span_days() > self.config.long_period_days {
            report.warning(
                ValidationIssue::new(
                    ValidationCode::LongPeriod,
                    format!(
                        "Period spans {} days (limit {})",
                        period.span_days(),
                        self.config.long_period_days
                    ),
                )
                .on_field("period"),
            );
        }

        true
    }

    fn check_account(&self, statement: &BankStatementData, report: &mut ValidationReport) {
        let account = &statement.account;

        if account.account_number.trim().is_empty() {
            report.error(
                ValidationIssue::new(ValidationCode::MissingAccountNumber, "Account number is missing")
                    .on_field("account.accountNumber"),
            );
            return;
        }

        if !validate_brazilian_account(&account.bank_code, &account.branch_code, &account.account_number) {
            report.warning(
                ValidationIssue::new(
                    ValidationCode::InvalidBankAccount,
                    format!(
                        "Bank account {}/{}/{} is not a valid Brazilian account",
                        account.bank_code, account.branch_code, account.account_number
                    ),
                )
                .on_field("account"),
            );
        }
    }

    fn check_balance(&self, statement: &BankStatementData, report: &mut ValidationReport) {
        let engine = ReconciliationEngine::with_tolerance(self.config.balance_tolerance);
        let reconciliation = engine.reconcile(statement);

        let severity = match reconciliation.result {
            ReconciliationResult::Balanced { .. } => return,
            ReconciliationResult::MinorDiscrepancy { .. } => "minor",
            ReconciliationResult::MajorDiscrepancy { .. } => "major",
        };

        report.warning(
            ValidationIssue::new(
                ValidationCode::BalanceMismatch,
                format!(
                    "Balance mismatch ({}): opening {} + movements = {}, declared closing {}",
                    severity,
                    reconciliation.opening_balance,
                    reconciliation.calculated_balance,
                    reconciliation.declared_balance
                ),
            )
            .on_field("balance.closingBalance"),
        );
    }

    fn check_transactions(
        &self,
        statement: &BankStatementData,
        period_ok: bool,
        report: &mut ValidationReport,
    ) {
        for (index, tx) in statement.transactions.iter().enumerate() {
            if !tx.direction_agrees() {
                report.error(
                    ValidationIssue::new(
                        ValidationCode::DirectionMismatch,
                        format!(
                            "Transaction {} is {} but amount is {}",
                            tx.fit_id,
                            tx.direction.as_str(),
                            tx.amount
                        ),
                    )
                    .on_field("direction")
                    .on_transaction(index),
                );
            }

            if period_ok && !statement.period.contains(tx.transaction_date) {
                report.warning(
                    ValidationIssue::new(
                        ValidationCode::TransactionOutOfPeriod,
                        format!(
                            "Transaction {} dated {} falls outside {} to {}",
                            tx.fit_id,
                            tx.transaction_date,
                            statement.period.start_date,
                            statement.period.end_date
                        ),
                    )
                    .on_field("transactionDate")
                    .on_transaction(index),
                );
            }

            if let Some(document) = &tx.payee_document {
                if validate_document(document).is_none() {
                    report.warning(
                        ValidationIssue::new(
                            ValidationCode::InvalidPayeeDocument,
                            format!("Payee document {} fails its CPF/CNPJ check", document),
                        )
                        .on_field("payeeDocument")
                        .on_transaction(index),
                    );
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
