// 🏷️ Categorization Rules - Rules as Data
// Description patterns plus direction/type constraints that map a bank
// transaction to a category.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::categorizer::normalize_description;
use crate::model::{BankTransaction, TransactionCategory, TransactionDirection, TransactionType};

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationRule {
    /// Rule ID for tracking
    pub id: String,

    pub name: String,

    /// Category to assign
    pub category: TransactionCategory,

    /// Priority (lower = evaluated first)
    #[serde(default)]
    pub priority: i32,

    /// Case-insensitive substrings (supports wildcards with *); any one matching is enough.
    /// A leading or trailing space pins the fragment to a word edge (" das ").
    #[serde(default)]
    pub description_patterns: Vec<String>,

    #[serde(default)]
    pub direction: Option<TransactionDirection>,

    #[serde(default)]
    pub transaction_type: Option<TransactionType>,

    /// Confidence score (0.0 - 1.0)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.8
}

impl CategorizationRule {
    pub fn new(id: &str, name: &str, category: TransactionCategory, priority: i32) -> Self {
        CategorizationRule {
            id: id.to_string(),
            name: name.to_string(),
            category,
            priority,
            description_patterns: Vec::new(),
            direction: None,
            transaction_type: None,
            confidence: default_confidence(),
        }
    }

    pub fn with_patterns(mut self, patterns: &[&str]) -> Self {
        self.description_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_direction(mut self, direction: TransactionDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// A rule with no patterns, direction or type would match everything
    pub fn has_constraint(&self) -> bool {
        self.description_patterns.iter().any(|p| !p.trim().is_empty())
            || self.direction.is_some()
            || self.transaction_type.is_some()
    }

    /// Check if any pattern matches an already-normalized description
    pub fn matches_description(&self, normalized: &str) -> bool {
        if self.description_patterns.is_empty() {
            return true;
        }

        self.description_patterns
            .iter()
            .any(|pattern| pattern_matches(pattern, normalized))
    }

    /// All constraints hold for `tx` (unset constraints match anything)
    pub fn applies_to(&self, tx: &BankTransaction, normalized: &str) -> bool {
        if let Some(direction) = self.direction {
            if tx.direction != direction {
                return false;
            }
        }

        if let Some(transaction_type) = self.transaction_type {
            if tx.transaction_type != transaction_type {
                return false;
            }
        }

        self.matches_description(normalized)
    }
}

/// Match one pattern against normalized text.
///
/// Patterns are case-insensitive substrings: "posto" matches "autoposto sao
/// jose". A leading or trailing space in the pattern requires a word edge
/// there, so " das " matches "pagto das simples" but not "vendas".
/// With `*`, the pieces must appear in order.
pub fn pattern_matches(pattern: &str, normalized: &str) -> bool {
    // Padded so edge-anchored fragments also match at either end
    let text = format!(" {} ", normalized);

    if pattern.contains('*') {
        let mut current_pos = 0;

        for part in pattern.split('*') {
            let fragment = anchored_fragment(part);
            if fragment.trim().is_empty() {
                continue;
            }

            match text[current_pos..].find(fragment.as_str()) {
                // A trailing anchor space may start the next fragment
                Some(pos) => current_pos += pos + fragment.trim_end().len(),
                None => return false,
            }
        }

        true
    } else {
        let fragment = anchored_fragment(pattern);
        !fragment.trim().is_empty() && text.contains(fragment.as_str())
    }
}

/// Normalized pattern, keeping one space where the pattern had edge whitespace
fn anchored_fragment(pattern: &str) -> String {
    let core = normalize_description(pattern);
    if core.is_empty() {
        return core;
    }

    let mut fragment = String::with_capacity(core.len() + 2);
    if pattern.starts_with(char::is_whitespace) {
        fragment.push(' ');
    }
    fragment.push_str(&core);
    if pattern.ends_with(char::is_whitespace) {
        fragment.push(' ');
    }
    fragment
}

/// First rule in evaluation order that applies to `tx`.
///
/// Evaluation order is ascending priority; equal priorities keep slice order.
pub fn match_rule<'a>(
    tx: &BankTransaction,
    rules: &'a [CategorizationRule],
) -> Option<&'a CategorizationRule> {
    let normalized = tx
        .normalized_description
        .clone()
        .unwrap_or_else(|| normalize_description(&tx.description));

    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.applies_to(tx, &normalized))
        .min_by_key(|(index, rule)| (rule.priority, *index))
        .map(|(_, rule)| rule)
}

// ============================================================================
// RULE ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<CategorizationRule>,
}

impl RuleEngine {
    /// Create a new empty rule engine
    pub fn new() -> Self {
        RuleEngine { rules: Vec::new() }
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rules = load_rules(path)?;
        Ok(RuleEngine::from_rules(rules))
    }

    /// Create engine from a list of rules
    pub fn from_rules(rules: Vec<CategorizationRule>) -> Self {
        let mut engine = RuleEngine::new();
        for rule in rules {
            engine.add_rule(rule);
        }
        engine
    }

    /// Add a single rule; stays behind existing rules of equal priority
    pub fn add_rule(&mut self, mut rule: CategorizationRule) {
        rule.confidence = rule.confidence.clamp(0.0, 1.0);
        self.rules.push(rule);
        // Stable sort keeps insertion order among equal priorities
        self.rules.sort_by_key(|r| r.priority);
    }

    pub fn find_match(&self, tx: &BankTransaction) -> Option<&CategorizationRule> {
        match_rule(tx, &self.rules)
    }

    pub fn rules(&self) -> &[CategorizationRule] {
        &self.rules
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.iter().any(|r| r.id == rule_id)
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Read a JSON array of rules
pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<Vec<CategorizationRule>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

    let rules: Vec<CategorizationRule> =
        serde_json::from_str(&content).context("Failed to parse rules JSON")?;

    Ok(rules)
}

// ============================================================================
// TESTS
// ============================================================================
