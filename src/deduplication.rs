// 🔍 Deduplication Engine - Detect duplicate bank transactions
// Two strategies: FITID match and (date, amount, description) signature match.
//
// Internal: duplicates inside one statement (later row points at the earlier).
// External: new transactions already present in previously imported history.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::BankTransaction;

// ============================================================================
// MATCH STRATEGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStrategy {
    /// Same bank-assigned FITID
    FitId,

    /// Same date, amount and description
    Signature,
}

// ============================================================================
// DUPLICATE MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateMatch {
    /// Index of the duplicate transaction in the checked list
    pub index: usize,

    /// Index of the transaction it duplicates (same list or history)
    pub matched_index: usize,

    /// Which strategy detected this match
    pub strategy: MatchStrategy,

    /// Human-readable reason
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheckResult {
    pub has_duplicates: bool,
    pub duplicates: Vec<DuplicateMatch>,
}

impl DuplicateCheckResult {
    fn from_matches(duplicates: Vec<DuplicateMatch>) -> Self {
        DuplicateCheckResult {
            has_duplicates: !duplicates.is_empty(),
            duplicates,
        }
    }
}

/// (date, normalized amount, trimmed lowercase description)
type Signature = (NaiveDate, Decimal, String);

fn signature(tx: &BankTransaction) -> Signature {
    (
        tx.transaction_date,
        tx.amount.normalize(),
        tx.description.trim().to_lowercase(),
    )
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DeduplicationEngine;

impl DeduplicationEngine {
    pub fn new() -> Self {
        DeduplicationEngine
    }

    /// Duplicates within one statement.
    ///
    /// Synthetic FITIDs embed the row index, so only bank-assigned FITIDs
    /// take part in the FITID strategy.
    pub fn check_internal_duplicates(&self, transactions: &[BankTransaction]) -> DuplicateCheckResult {
        let mut by_fit_id: HashMap<&str, usize> = HashMap::new();
        let mut by_signature: HashMap<Signature, usize> = HashMap::new();
        let mut matches = Vec::new();

        for (index, tx) in transactions.iter().enumerate() {
            let sig = signature(tx);
            let fit_id = (!tx.has_synthetic_fit_id() && !tx.fit_id.is_empty())
                .then_some(tx.fit_id.as_str());

            if let Some(&first) = fit_id.and_then(|id| by_fit_id.get(id)) {
                matches.push(DuplicateMatch {
                    index,
                    matched_index: first,
                    strategy: MatchStrategy::FitId,
                    reason: format!("FITID {} repeats transaction #{}", tx.fit_id, first + 1),
                });
            } else if let Some(&first) = by_signature.get(&sig) {
                matches.push(DuplicateMatch {
                    index,
                    matched_index: first,
                    strategy: MatchStrategy::Signature,
                    reason: format!(
                        "Same date, amount and description as transaction #{}: {} | {} | {}",
                        first + 1,
                        tx.transaction_date,
                        tx.amount,
                        tx.description.trim()
                    ),
                });
            }

            if let Some(id) = fit_id {
                by_fit_id.entry(id).or_insert(index);
            }
            by_signature.entry(sig).or_insert(index);
        }

        DuplicateCheckResult::from_matches(matches)
    }

    /// New transactions already present in `existing` history.
    ///
    /// A FITID match alone is enough, even when other fields differ.
    pub fn check_external_duplicates(
        &self,
        transactions: &[BankTransaction],
        existing: &[BankTransaction],
    ) -> DuplicateCheckResult {
        let mut by_fit_id: HashMap<&str, usize> = HashMap::new();
        let mut by_signature: HashMap<Signature, usize> = HashMap::new();

        for (index, tx) in existing.iter().enumerate() {
            if !tx.fit_id.is_empty() {
                by_fit_id.entry(tx.fit_id.as_str()).or_insert(index);
            }
            by_signature.entry(signature(tx)).or_insert(index);
        }

        let matches = transactions
            .iter()
            .enumerate()
            .filter_map(|(index, tx)| {
                if let Some(&matched_index) = by_fit_id.get(tx.fit_id.as_str()) {
                    return Some(DuplicateMatch {
                        index,
                        matched_index,
                        strategy: MatchStrategy::FitId,
                        reason: format!("FITID {} was already imported", tx.fit_id),
                    });
                }

                by_signature.get(&signature(tx)).map(|&matched_index| DuplicateMatch {
                    index,
                    matched_index,
                    strategy: MatchStrategy::Signature,
                    reason: format!(
                        "Already imported: {} | {} | {}",
                        tx.transaction_date,
                        tx.amount,
                        tx.description.trim()
                    ),
                })
            })
            .collect();

        DuplicateCheckResult::from_matches(matches)
    }
}

// ============================================================================
// TESTS
// ============================================================================
