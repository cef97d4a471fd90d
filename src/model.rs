// 🧾 Canonical Statement Model
// Every format parser produces these types; everything downstream consumes them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Prefix of ids generated for transactions whose source carries no FITID.
pub const SYNTHETIC_FIT_ID_PREFIX: &str = "SYN-";

/// Currency assumed when a statement does not declare one.
pub const DEFAULT_CURRENCY: &str = "BRL";

// ============================================================================
// ENUMS
// ============================================================================

/// Statement file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementFormat {
    Ofx,
    Qfx,
    Csv,
}

impl StatementFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementFormat::Ofx => "OFX",
            StatementFormat::Qfx => "QFX",
            StatementFormat::Csv => "CSV",
        }
    }

    /// Case-insensitive lookup ("ofx", "Qfx", "CSV")
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "OFX" => Some(StatementFormat::Ofx),
            "QFX" => Some(StatementFormat::Qfx),
            "CSV" => Some(StatementFormat::Csv),
            _ => None,
        }
    }
}

impl fmt::Display for StatementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionDirection {
    Credit,
    Debit,
}

impl TransactionDirection {
    /// Zero amounts count as credits.
    pub fn from_amount(amount: Decimal) -> Self {
        if amount < Decimal::ZERO {
            TransactionDirection::Debit
        } else {
            TransactionDirection::Credit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionDirection::Credit => "CREDIT",
            TransactionDirection::Debit => "DEBIT",
        }
    }
}

/// Transaction type tag, following the OFX TRNTYPE vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Credit,
    Debit,
    Int,
    Div,
    Fee,
    SrvChg,
    Dep,
    Atm,
    Pos,
    Xfer,
    Check,
    Payment,
    Cash,
    DirectDep,
    DirectDebit,
    RepeatPmt,
    Other,
}

impl TransactionType {
    /// Map an OFX `<TRNTYPE>` value. Unknown tags become `Other`.
    pub fn from_ofx(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "CREDIT" => TransactionType::Credit,
            "DEBIT" => TransactionType::Debit,
            "INT" => TransactionType::Int,
            "DIV" => TransactionType::Div,
            "FEE" => TransactionType::Fee,
            "SRVCHG" => TransactionType::SrvChg,
            "DEP" => TransactionType::Dep,
            "ATM" => TransactionType::Atm,
            "POS" => TransactionType::Pos,
            "XFER" => TransactionType::Xfer,
            "CHECK" => TransactionType::Check,
            "PAYMENT" => TransactionType::Payment,
            "CASH" => TransactionType::Cash,
            "DIRECTDEP" => TransactionType::DirectDep,
            "DIRECTDEBIT" => TransactionType::DirectDebit,
            "REPEATPMT" => TransactionType::RepeatPmt,
            _ => TransactionType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "CREDIT",
            TransactionType::Debit => "DEBIT",
            TransactionType::Int => "INT",
            TransactionType::Div => "DIV",
            TransactionType::Fee => "FEE",
            TransactionType::SrvChg => "SRVCHG",
            TransactionType::Dep => "DEP",
            TransactionType::Atm => "ATM",
            TransactionType::Pos => "POS",
            TransactionType::Xfer => "XFER",
            TransactionType::Check => "CHECK",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Cash => "CASH",
            TransactionType::DirectDep => "DIRECTDEP",
            TransactionType::DirectDebit => "DIRECTDEBIT",
            TransactionType::RepeatPmt => "REPEATPMT",
            TransactionType::Other => "OTHER",
        }
    }
}

/// Spending/income category assigned by the categorizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionCategory {
    Transfer,
    Interest,
    BankFee,
    Tax,
    Fuel,
    Toll,
    VehicleMaintenance,
    Salary,
    Utilities,
    Insurance,
    Rent,
    SupplierPayment,
    CustomerReceipt,
    Other,
}

impl TransactionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::Transfer => "TRANSFER",
            TransactionCategory::Interest => "INTEREST",
            TransactionCategory::BankFee => "BANK_FEE",
            TransactionCategory::Tax => "TAX",
            TransactionCategory::Fuel => "FUEL",
            TransactionCategory::Toll => "TOLL",
            TransactionCategory::VehicleMaintenance => "VEHICLE_MAINTENANCE",
            TransactionCategory::Salary => "SALARY",
            TransactionCategory::Utilities => "UTILITIES",
            TransactionCategory::Insurance => "INSURANCE",
            TransactionCategory::Rent => "RENT",
            TransactionCategory::SupplierPayment => "SUPPLIER_PAYMENT",
            TransactionCategory::CustomerReceipt => "CUSTOMER_RECEIPT",
            TransactionCategory::Other => "OTHER",
        }
    }
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReconciliationStatus {
    #[default]
    Pending,
    Matched,
    Unmatched,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    #[default]
    Checking,
    Savings,
    #[serde(rename = "MONEYMRKT")]
    MoneyMarket,
    CreditLine,
}

impl AccountType {
    /// Map an OFX `<ACCTTYPE>` value. Unknown values fall back to checking.
    pub fn from_ofx(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "SAVINGS" => AccountType::Savings,
            "MONEYMRKT" => AccountType::MoneyMarket,
            "CREDITLINE" => AccountType::CreditLine,
            _ => AccountType::Checking,
        }
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// One canonical bank transaction.
///
/// `amount` is signed: credits are non-negative, debits non-positive, and
/// `direction` always agrees with that sign for parser-built transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransaction {
    pub fit_id: String,
    pub check_number: Option<String>,
    pub reference_number: Option<String>,
    pub transaction_date: NaiveDate,
    pub post_date: Option<NaiveDate>,
    /// Posting instant normalized to UTC (OFX only)
    pub posted_at: Option<DateTime<Utc>>,
    pub amount: Decimal,
    pub direction: TransactionDirection,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub description: String,
    pub normalized_description: Option<String>,
    pub memo: Option<String>,
    pub payee: Option<String>,
    pub payee_document: Option<String>,
    pub category: Option<TransactionCategory>,
    pub category_confidence: Option<f64>,
    #[serde(default)]
    pub reconciliation_status: ReconciliationStatus,
    pub matched_payable_id: Option<String>,
    pub matched_receivable_id: Option<String>,
    #[serde(default)]
    pub raw_data: BTreeMap<String, String>,
}

impl BankTransaction {
    /// Create a transaction whose direction follows the amount sign.
    pub fn new(
        fit_id: String,
        transaction_date: NaiveDate,
        amount: Decimal,
        description: String,
    ) -> Self {
        BankTransaction {
            fit_id,
            check_number: None,
            reference_number: None,
            transaction_date,
            post_date: None,
            posted_at: None,
            amount,
            direction: TransactionDirection::from_amount(amount),
            transaction_type: TransactionType::Other,
            description,
            normalized_description: None,
            memo: None,
            payee: None,
            payee_document: None,
            category: None,
            category_confidence: None,
            reconciliation_status: ReconciliationStatus::Pending,
            matched_payable_id: None,
            matched_receivable_id: None,
            raw_data: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    pub fn with_memo(mut self, memo: Option<String>) -> Self {
        self.memo = memo;
        self
    }

    pub fn with_payee(mut self, payee: Option<String>) -> Self {
        self.payee = payee;
        self
    }

    pub fn with_check_number(mut self, check_number: Option<String>) -> Self {
        self.check_number = check_number;
        self
    }

    pub fn with_reference_number(mut self, reference_number: Option<String>) -> Self {
        self.reference_number = reference_number;
        self
    }

    pub fn with_post_date(mut self, post_date: Option<NaiveDate>) -> Self {
        self.post_date = post_date;
        self
    }

    pub fn with_posted_at(mut self, posted_at: Option<DateTime<Utc>>) -> Self {
        self.posted_at = posted_at;
        self
    }

    /// Echo a source field for audit
    pub fn with_raw(mut self, key: &str, value: &str) -> Self {
        self.raw_data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn is_credit(&self) -> bool {
        self.direction == TransactionDirection::Credit
    }

    pub fn is_debit(&self) -> bool {
        self.direction == TransactionDirection::Debit
    }

    /// True when `direction` agrees with the sign of `amount`.
    pub fn direction_agrees(&self) -> bool {
        match self.direction {
            TransactionDirection::Credit => self.amount >= Decimal::ZERO,
            TransactionDirection::Debit => self.amount <= Decimal::ZERO,
        }
    }

    pub fn has_synthetic_fit_id(&self) -> bool {
        self.fit_id.starts_with(SYNTHETIC_FIT_ID_PREFIX)
    }

    pub fn mark_matched_payable(&mut self, payable_id: &str) {
        self.matched_payable_id = Some(payable_id.to_string());
        self.reconciliation_status = ReconciliationStatus::Matched;
    }

    pub fn mark_matched_receivable(&mut self, receivable_id: &str) {
        self.matched_receivable_id = Some(receivable_id.to_string());
        self.reconciliation_status = ReconciliationStatus::Matched;
    }

    pub fn mark_unmatched(&mut self) {
        self.matched_payable_id = None;
        self.matched_receivable_id = None;
        self.reconciliation_status = ReconciliationStatus::Unmatched;
    }

    pub fn mark_ignored(&mut self) {
        self.reconciliation_status = ReconciliationStatus::Ignored;
    }
}

/// Deterministic id for a transaction that arrived without a FITID.
///
/// Same `(date, amount, description, row)` always yields the same id, so
/// re-importing a file produces identical ids.
pub fn synthetic_fit_id(
    date: NaiveDate,
    amount: Decimal,
    description: &str,
    row_index: usize,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}",
        date.format("%Y-%m-%d"),
        amount.normalize(),
        description.trim(),
        row_index
    ));
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("{}{}", SYNTHETIC_FIT_ID_PREFIX, hex)
}

// ============================================================================
// STATEMENT PARTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountInfo {
    pub bank_code: String,
    pub bank_name: Option<String>,
    pub branch_code: String,
    pub account_number: String,
    pub account_type: AccountType,
    pub currency: String,
}

impl Default for BankAccountInfo {
    fn default() -> Self {
        BankAccountInfo {
            bank_code: String::new(),
            bank_name: None,
            branch_code: String::new(),
            account_number: String::new(),
            account_type: AccountType::Checking,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
}

impl Period {
    /// Inclusive-exclusive span in days (end - start)
    pub fn span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub currency: String,
    pub as_of_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTotals {
    pub count: usize,
    pub total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_transactions: usize,
    pub total_credits: Decimal,
    pub total_debits: Decimal,
    pub credit_count: usize,
    pub debit_count: usize,
    pub net_movement: Decimal,
    pub by_type: BTreeMap<TransactionType, TypeTotals>,
    pub average_transaction_amount: Decimal,
}

// ============================================================================
// VALIDATION DIAGNOSTICS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    InvalidPeriod,
    MissingAccountNumber,
    NoTransactions,
    LongPeriod,
    BalanceMismatch,
    DuplicateTransaction,
    ExternalDuplicate,
    DirectionMismatch,
    TransactionOutOfPeriod,
    InvalidBankAccount,
    InvalidPayeeDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: ValidationCode,
    pub message: String,
    pub field: Option<String>,
    pub transaction_index: Option<usize>,
}

impl ValidationIssue {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        ValidationIssue {
            code,
            message: message.into(),
            field: None,
            transaction_index: None,
        }
    }

    pub fn on_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn on_transaction(mut self, index: usize) -> Self {
        self.transaction_index = Some(index);
        self
    }
}

// ============================================================================
// STATEMENT AGGREGATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankStatementData {
    pub id: String,
    pub format: StatementFormat,
    pub file_name: String,
    pub parsed_at: DateTime<Utc>,
    pub account: BankAccountInfo,
    pub period: Period,
    pub balance: Balance,
    pub transactions: Vec<BankTransaction>,
    pub summary: Summary,
    pub is_valid: bool,
    pub validation_errors: Vec<ValidationIssue>,
    pub validation_warnings: Vec<ValidationIssue>,
}

impl BankStatementData {
    /// Assemble a freshly parsed statement. Validation has not run yet, so
    /// the statement starts out valid with no diagnostics.
    pub fn new(
        format: StatementFormat,
        file_name: &str,
        account: BankAccountInfo,
        period: Period,
        balance: Balance,
        transactions: Vec<BankTransaction>,
    ) -> Self {
        let summary = crate::summary::compute_summary(&transactions);

        BankStatementData {
            id: uuid::Uuid::new_v4().to_string(),
            format,
            file_name: file_name.to_string(),
            parsed_at: Utc::now(),
            account,
            period,
            balance,
            transactions,
            summary,
            is_valid: true,
            validation_errors: Vec::new(),
            validation_warnings: Vec::new(),
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_direction_follows_amount_sign() {
        let credit = BankTransaction::new("1".into(), date(2026, 1, 5), dec!(10.00), "X".into());
        let debit = BankTransaction::new("2".into(), date(2026, 1, 5), dec!(-10.00), "X".into());

        assert!(credit.is_credit());
        assert!(debit.is_debit());
        assert!(credit.direction_agrees());
        assert!(debit.direction_agrees());
    }

    #[test]
    fn test_direction_mismatch_detected() {
        let mut tx = BankTransaction::new("1".into(), date(2026, 1, 5), dec!(-5), "X".into());
        tx.direction = TransactionDirection::Credit;
        assert!(!tx.direction_agrees());
    }

    #[test]
    fn test_synthetic_fit_id_is_deterministic() {
        let a = synthetic_fit_id(date(2026, 1, 5), dec!(1500.00), "PIX RECEBIDO", 0);
        let b = synthetic_fit_id(date(2026, 1, 5), dec!(1500.0), "PIX RECEBIDO ", 0);
        let c = synthetic_fit_id(date(2026, 1, 5), dec!(1500.00), "PIX RECEBIDO", 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with(SYNTHETIC_FIT_ID_PREFIX));
        assert_eq!(a.len(), SYNTHETIC_FIT_ID_PREFIX.len() + 16);
    }

    #[test]
    fn test_transaction_type_from_ofx() {
        assert_eq!(TransactionType::from_ofx("xfer"), TransactionType::Xfer);
        assert_eq!(TransactionType::from_ofx(" PAYMENT "), TransactionType::Payment);
        assert_eq!(TransactionType::from_ofx("SRVCHG"), TransactionType::SrvChg);
        assert_eq!(TransactionType::from_ofx("WHATEVER"), TransactionType::Other);
    }

    #[test]
    fn test_reconciliation_marks() {
        let mut tx = BankTransaction::new("1".into(), date(2026, 1, 5), dec!(-5), "X".into());
        assert_eq!(tx.reconciliation_status, ReconciliationStatus::Pending);

        tx.mark_matched_payable("AP-42");
        assert_eq!(tx.reconciliation_status, ReconciliationStatus::Matched);
        assert_eq!(tx.matched_payable_id.as_deref(), Some("AP-42"));

        tx.mark_unmatched();
        assert_eq!(tx.reconciliation_status, ReconciliationStatus::Unmatched);
        assert!(tx.matched_payable_id.is_none());
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let tx = BankTransaction::new("1".into(), date(2026, 1, 5), dec!(-5), "X".into())
            .with_type(TransactionType::Xfer);
        let json = serde_json::to_value(&tx).unwrap();

        assert_eq!(json["type"], "XFER");
        assert_eq!(json["direction"], "DEBIT");
        assert_eq!(json["reconciliationStatus"], "PENDING");
        assert_eq!(json["fitId"], "1");
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(StatementFormat::from_name("ofx"), Some(StatementFormat::Ofx));
        assert_eq!(StatementFormat::from_name("Qfx"), Some(StatementFormat::Qfx));
        assert_eq!(StatementFormat::from_name("txt"), None);
    }
}
