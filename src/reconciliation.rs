// ⚖️ Reconciliation Engine - Validate statement balances
//
// Following the formula:
//   opening_balance + total_credits - total_debits = closing_balance
//
// Credits/debits come from the signed amounts, so the check is equivalent to
//   |opening + Σ amount − closing| ≤ tolerance

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{BankStatementData, BankTransaction, TransactionDirection};

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationResult {
    /// Balances match within tolerance
    Balanced {
        opening_balance: Decimal,
        total_credits: Decimal,
        total_debits: Decimal,
        closing_balance: Decimal,
    },

    /// Off by more than the tolerance but less than the major threshold
    MinorDiscrepancy {
        expected_balance: Decimal,
        actual_balance: Decimal,
        difference: Decimal,
        tolerance: Decimal,
    },

    /// Off by at least the major threshold (usually a missing transaction)
    MajorDiscrepancy {
        expected_balance: Decimal,
        actual_balance: Decimal,
        difference: Decimal,
    },
}

impl ReconciliationResult {
    pub fn is_balanced(&self) -> bool {
        matches!(self, ReconciliationResult::Balanced { .. })
    }

    pub fn has_discrepancy(&self) -> bool {
        !self.is_balanced()
    }

    pub fn difference(&self) -> Decimal {
        match self {
            ReconciliationResult::Balanced { .. } => Decimal::ZERO,
            ReconciliationResult::MinorDiscrepancy { difference, .. } => *difference,
            ReconciliationResult::MajorDiscrepancy { difference, .. } => *difference,
        }
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub result: ReconciliationResult,
    pub transaction_count: usize,
    pub opening_balance: Decimal,
    pub total_credits: Decimal,
    pub total_debits: Decimal,
    pub calculated_balance: Decimal,
    pub declared_balance: Decimal,
    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_balanced(&self) -> bool {
        self.result.is_balanced()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} transactions, calculated {:.2}, declared {:.2}, difference {:.2}",
            self.transaction_count,
            self.calculated_balance,
            self.declared_balance,
            self.result.difference()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    /// Accepted difference (default: 0.01)
    pub tolerance: Decimal,

    /// Threshold for minor vs major discrepancy (default: 10.00)
    pub major_discrepancy_threshold: Decimal,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            tolerance: Decimal::new(1, 2),
            major_discrepancy_threshold: Decimal::new(10, 0),
        }
    }

    pub fn with_tolerance(tolerance: Decimal) -> Self {
        ReconciliationEngine {
            tolerance,
            ..ReconciliationEngine::new()
        }
    }

    /// Reconcile a statement's transactions against its declared balances
    pub fn reconcile(&self, statement: &BankStatementData) -> ReconciliationReport {
        let transactions = &statement.transactions;
        let opening_balance = statement.balance.opening_balance;
        let declared_balance = statement.balance.closing_balance;

        let total_credits = self.calculate_credits(transactions);
        let total_debits = self.calculate_debits(transactions);

        // Formula: opening + credits - debits = closing
        let calculated_balance = opening_balance + total_credits - total_debits;
        let difference = (calculated_balance - declared_balance).abs();

        let result = if difference <= self.tolerance {
            ReconciliationResult::Balanced {
                opening_balance,
                total_credits,
                total_debits,
                closing_balance: declared_balance,
            }
        } else if difference < self.major_discrepancy_threshold {
            ReconciliationResult::MinorDiscrepancy {
                expected_balance: declared_balance,
                actual_balance: calculated_balance,
                difference,
                tolerance: self.tolerance,
            }
        } else {
            ReconciliationResult::MajorDiscrepancy {
                expected_balance: declared_balance,
                actual_balance: calculated_balance,
                difference,
            }
        };

        ReconciliationReport {
            result,
            transaction_count: transactions.len(),
            opening_balance,
            total_credits,
            total_debits,
            calculated_balance,
            declared_balance,
            reconciled_at: Utc::now(),
        }
    }

    /// Sum of credit magnitudes
    fn calculate_credits(&self, transactions: &[BankTransaction]) -> Decimal {
        transactions
            .iter()
            .filter(|tx| tx.direction == TransactionDirection::Credit)
            .map(|tx| tx.amount.abs())
            .sum()
    }

    /// Sum of debit magnitudes
    fn calculate_debits(&self, transactions: &[BankTransaction]) -> Decimal {
        transactions
            .iter()
            .filter(|tx| tx.direction == TransactionDirection::Debit)
            .map(|tx| tx.amount.abs())
            .sum()
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
