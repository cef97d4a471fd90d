// 🏦 Bank Entity - FEBRABAN code is identity, names are values
//
// Problem solved:
// - "Itaú", "Itau Unibanco", "ITAU" → all bank 341
// - OFX files write BANKID as "0341" or "341"; CSV files carry no code at all
// - Statements always end up with the 3-digit code plus a display name

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_REGISTRY: Lazy<BankRegistry> = Lazy::new(BankRegistry::new);

// ============================================================================
// BANK ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    /// 3-digit FEBRABAN code - never changes
    pub code: String,

    /// Canonical name (the "official" name we display)
    pub canonical_name: String,

    /// Alternative names that map to this bank
    pub aliases: Vec<String>,
}

impl Bank {
    pub fn new(code: &str, canonical_name: &str) -> Self {
        Bank {
            code: code.to_string(),
            canonical_name: canonical_name.to_string(),
            aliases: Vec::new(),
        }
    }

    /// Add an alias to this bank
    pub fn add_alias(&mut self, alias: &str) {
        if !self.aliases.iter().any(|a| a == alias) && alias != self.canonical_name {
            self.aliases.push(alias.to_string());
        }
    }

    /// Check if a string names this bank (canonical name or any alias, accent-insensitive)
    pub fn matches(&self, bank_string: &str) -> bool {
        let needle = crate::text::fold(bank_string);
        if needle.is_empty() {
            return false;
        }

        std::iter::once(&self.canonical_name)
            .chain(self.aliases.iter())
            .any(|name| crate::text::fold(name) == needle)
    }
}

// ============================================================================
// BANK REGISTRY
// ============================================================================

pub struct BankRegistry {
    banks: Vec<Bank>,
}

impl BankRegistry {
    /// Create new registry with the banks seen in Brazilian exports
    pub fn new() -> Self {
        let mut registry = BankRegistry { banks: Vec::new() };
        registry.register_default_banks();
        registry
    }

    /// Shared read-only registry
    pub fn global() -> &'static BankRegistry {
        &DEFAULT_REGISTRY
    }

    fn register_default_banks(&mut self) {
        let defaults: [(&str, &str, &[&str]); 12] = [
            ("001", "Banco do Brasil", &["BB", "Banco do Brasil S.A."]),
            ("033", "Santander", &["Banco Santander", "Santander Brasil"]),
            ("041", "Banrisul", &["Banco do Estado do Rio Grande do Sul"]),
            ("077", "Banco Inter", &["Inter"]),
            ("104", "Caixa Econômica Federal", &["Caixa", "CEF"]),
            ("208", "BTG Pactual", &["BTG"]),
            ("237", "Bradesco", &["Banco Bradesco", "Bradesco S.A."]),
            ("260", "Nu Pagamentos", &["Nubank", "Nu"]),
            ("336", "Banco C6", &["C6 Bank", "C6"]),
            ("341", "Itaú Unibanco", &["Itaú", "Itau", "Itaú Unibanco S.A."]),
            ("748", "Sicredi", &["Banco Cooperativo Sicredi"]),
            ("756", "Sicoob", &["Bancoob", "Banco Cooperativo do Brasil"]),
        ];

        for (code, name, aliases) in defaults {
            let mut bank = Bank::new(code, name);
            for alias in aliases {
                bank.add_alias(alias);
            }
            self.register(bank);
        }
    }

    /// Register a bank; a bank with the same code is replaced
    pub fn register(&mut self, bank: Bank) {
        self.banks.retain(|b| b.code != bank.code);
        self.banks.push(bank);
    }

    /// Find bank by FEBRABAN code ("341", "0341" and "341-7" all work)
    pub fn find_by_code(&self, code: &str) -> Option<&Bank> {
        let code = normalize_bank_code(code)?;
        self.banks.iter().find(|b| b.code == code)
    }

    /// Find bank by name or alias
    pub fn find_by_string(&self, bank_string: &str) -> Option<&Bank> {
        self.banks.iter().find(|b| b.matches(bank_string))
    }

    /// Display name for a code, if known
    pub fn name_for_code(&self, code: &str) -> Option<String> {
        self.find_by_code(code).map(|b| b.canonical_name.clone())
    }

    pub fn all_banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn count(&self) -> usize {
        self.banks.len()
    }
}

impl Default for BankRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a raw bank id to the 3-digit FEBRABAN form.
///
/// Drops a trailing check digit ("341-7"), strips surplus leading zeros
/// ("0341") and left-pads short codes ("1" → "001"). Returns `None` when the
/// value is not numeric or has more than three significant digits.
pub fn normalize_bank_code(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw.split('-').next().unwrap_or(raw).trim();

    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let significant = raw.trim_start_matches('0');
    if significant.len() > 3 {
        return None;
    }

    Some(format!("{:0>3}", significant))
}

// ============================================================================
// TESTS
// ============================================================================
