// 🗃️ Transaction Categorizer - built-in Brazilian rules + custom rules
//
// Evaluation:
// 1. Rules sorted by priority (lower first, ties keep insertion order)
// 2. First rule whose patterns/direction/type all hold wins
// 3. Nothing matched → OTHER with the default (low) confidence
//
// Also owns description normalization and payee extraction, which the
// rules and the batch pass depend on.

use anyhow::Result as AnyhowResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::CategorizerConfig;
use crate::documents::extract_document_from_description;
use crate::error::{Result, StatementError};
use crate::model::{BankTransaction, TransactionCategory, TransactionDirection, TransactionType};
use crate::rules::{load_rules, pattern_matches, CategorizationRule, RuleEngine};
use crate::text::{collapse_whitespace, fold_accents};

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,2}/\d{1,2}/(?:\d{4}|\d{2})\b").expect("valid date regex")
});

// Patterns are substrings; short acronyms carry spaces to match whole words only
const TAX_PATTERNS: &[&str] = &[
    "darf", " iof ", " gps ", " das ", "icms", "irrf", "ipva", "iptu", " inss ", "fgts", " pis ",
    "cofins", "simples nacional", "imposto", "tributo", "receita federal", "sefaz", " gnre ",
    " dae ",
];

const FEE_PATTERNS: &[&str] = &[
    "tarifa", " tar ", "cesta", "pacote servico", "anuidade", "taxa manutencao", "manutencao conta",
    "taxa bancaria", "custas", "encargo",
];

const SALARY_PATTERNS: &[&str] = &[
    "salario", "folha pagamento", "folha de pagamento", "pagto salario", "adiantamento salarial",
    "pro labore", "prolabore", "ferias", "rescisao",
];

const TRANSFER_PATTERNS: &[&str] = &[" pix ", " ted ", " doc ", "transferencia", " transf", " tef "];

/// Leading tokens dropped while extracting a payee name
const PAYEE_NOISE: &[&str] = &[
    "pix", "ted", "doc", "tef", "transf", "transferencia", "recebido", "recebida", "enviado",
    "enviada", "receb", "env", "credito", "debito", "de", "para", "da", "do", "em", "conta",
    "outra", "titularidade", "mesma", "instituicao", "qr", "code", "agendado", "agendada",
];

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationResult {
    pub category: TransactionCategory,
    pub confidence: f64,
    pub rule_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationSummary {
    pub total: usize,
    pub categorized: usize,
    pub low_confidence: usize,
    pub by_category: BTreeMap<TransactionCategory, usize>,
    pub average_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCategorization {
    pub transactions: Vec<BankTransaction>,
    pub summary: CategorizationSummary,
}

// ============================================================================
// CATEGORIZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransactionCategorizer {
    engine: RuleEngine,
    config: CategorizerConfig,
    next_custom_id: usize,
}

impl TransactionCategorizer {
    /// Categorizer with the built-in rules only
    pub fn new() -> Self {
        TransactionCategorizer {
            engine: RuleEngine::from_rules(builtin_rules()),
            config: CategorizerConfig::default(),
            next_custom_id: 1,
        }
    }

    /// Built-in rules plus the config's custom rules, each validated
    pub fn with_config(config: CategorizerConfig) -> Result<Self> {
        let custom_rules = config.custom_rules.clone();
        let mut categorizer = TransactionCategorizer {
            config,
            ..TransactionCategorizer::new()
        };

        for rule in custom_rules {
            categorizer.create_rule(rule)?;
        }

        Ok(categorizer)
    }

    /// Built-in rules plus custom rules read from a JSON file
    pub fn from_rules_file<P: AsRef<Path>>(path: P) -> AnyhowResult<Self> {
        let mut categorizer = TransactionCategorizer::new();
        for rule in load_rules(path)? {
            categorizer.create_rule(rule)?;
        }
        Ok(categorizer)
    }

    /// Validate and insert a custom rule; returns the stored rule
    pub fn create_rule(&mut self, mut rule: CategorizationRule) -> Result<CategorizationRule> {
        let label = if rule.name.trim().is_empty() {
            rule.id.clone()
        } else {
            rule.name.clone()
        };

        if rule.name.trim().is_empty() {
            return Err(StatementError::InvalidRule {
                rule: label,
                message: "name cannot be empty".to_string(),
            });
        }

        rule.description_patterns.retain(|p| !p.trim().is_empty());
        if !rule.has_constraint() {
            return Err(StatementError::InvalidRule {
                rule: label,
                message: "needs at least one pattern, direction or transaction type".to_string(),
            });
        }

        if !rule.confidence.is_finite() {
            return Err(StatementError::InvalidRule {
                rule: label,
                message: "confidence must be a number".to_string(),
            });
        }

        if rule.id.trim().is_empty() {
            rule.id = format!("custom-{}", self.next_custom_id);
            self.next_custom_id += 1;
        }

        if self.engine.contains(&rule.id) {
            return Err(StatementError::InvalidRule {
                rule: label,
                message: format!("duplicate rule id '{}'", rule.id),
            });
        }

        rule.confidence = rule.confidence.clamp(0.0, 1.0);
        tracing::debug!("Added categorization rule '{}' ({})", rule.id, rule.category);
        self.engine.add_rule(rule.clone());

        Ok(rule)
    }

    pub fn rules(&self) -> &[CategorizationRule] {
        self.engine.rules()
    }

    pub fn rule_count(&self) -> usize {
        self.engine.rule_count()
    }

    pub fn is_low_confidence(&self, confidence: f64) -> bool {
        confidence <= self.config.low_confidence_threshold
    }

    /// Category for one transaction. Rejects transactions whose direction
    /// disagrees with the amount sign.
    pub fn categorize(&self, tx: &BankTransaction) -> Result<CategorizationResult> {
        if !tx.direction_agrees() {
            return Err(StatementError::InvalidTransaction {
                fit_id: tx.fit_id.clone(),
                message: format!(
                    "direction {} disagrees with amount {}",
                    tx.direction.as_str(),
                    tx.amount
                ),
            });
        }

        let result = match self.engine.find_match(tx) {
            Some(rule) => CategorizationResult {
                category: rule.category,
                confidence: rule.confidence.clamp(0.0, 1.0),
                rule_id: Some(rule.id.clone()),
            },
            None => self.fallback(),
        };

        Ok(result)
    }

    fn fallback(&self) -> CategorizationResult {
        CategorizationResult {
            category: TransactionCategory::Other,
            confidence: self.config.default_confidence.clamp(0.0, 1.0),
            rule_id: None,
        }
    }

    /// Categorize in place, filling payee and payee document when absent.
    /// Transactions `categorize` rejects get OTHER at the default confidence.
    pub fn categorize_all(&self, transactions: &mut [BankTransaction]) -> Result<CategorizationSummary> {
        let mut summary = CategorizationSummary::default();
        let mut confidence_sum = 0.0;

        for tx in transactions.iter_mut() {
            // The validator reports the mismatch; the batch keeps going
            let result = match self.categorize(tx) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!("Leaving transaction uncategorized: {}", e);
                    self.fallback()
                }
            };

            tx.category = Some(result.category);
            tx.category_confidence = Some(result.confidence);

            if tx.payee.is_none() {
                tx.payee = extract_payee_from_description(&tx.description);
            }
            if tx.payee_document.is_none() {
                tx.payee_document = extract_document_from_description(&tx.description)
                    .or_else(|| tx.memo.as_deref().and_then(extract_document_from_description));
            }

            summary.total += 1;
            if result.category != TransactionCategory::Other {
                summary.categorized += 1;
            }
            if self.is_low_confidence(result.confidence) {
                summary.low_confidence += 1;
            }
            *summary.by_category.entry(result.category).or_insert(0) += 1;
            confidence_sum += result.confidence;
        }

        if summary.total > 0 {
            summary.average_confidence = confidence_sum / summary.total as f64;
        }

        tracing::debug!(
            "Categorized {} transactions ({} low confidence)",
            summary.total,
            summary.low_confidence
        );

        Ok(summary)
    }

    /// Categorize a batch, returning categorized copies plus a summary
    pub fn categorize_batch(&self, transactions: &[BankTransaction]) -> Result<BatchCategorization> {
        let mut transactions = transactions.to_vec();
        let summary = self.categorize_all(&mut transactions)?;

        Ok(BatchCategorization {
            transactions,
            summary,
        })
    }
}

impl Default for TransactionCategorizer {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in rule table
pub fn builtin_rules() -> Vec<CategorizationRule> {
    use TransactionCategory as C;
    use TransactionDirection::{Credit, Debit};

    vec![
        // OFX transaction types are the strongest signal
        CategorizationRule::new("builtin-xfer", "Transfer (XFER)", C::Transfer, 10)
            .with_type(TransactionType::Xfer)
            .with_confidence(1.0),
        CategorizationRule::new("builtin-int", "Interest (INT)", C::Interest, 10)
            .with_type(TransactionType::Int)
            .with_direction(Credit)
            .with_confidence(1.0),
        CategorizationRule::new("builtin-fee", "Bank fee (FEE)", C::BankFee, 10)
            .with_type(TransactionType::Fee)
            .with_confidence(1.0),
        CategorizationRule::new("builtin-srvchg", "Bank fee (SRVCHG)", C::BankFee, 10)
            .with_type(TransactionType::SrvChg)
            .with_confidence(1.0),
        // Keyword rules
        CategorizationRule::new("builtin-tax", "Taxes", C::Tax, 20)
            .with_patterns(TAX_PATTERNS)
            .with_confidence(0.9),
        CategorizationRule::new("builtin-bank-fee", "Bank fees", C::BankFee, 20)
            .with_patterns(FEE_PATTERNS)
            .with_confidence(0.9),
        CategorizationRule::new("builtin-interest", "Interest income", C::Interest, 30)
            .with_patterns(&["rendimento", "juros recebidos", "remuneracao", "rend pago", "rend aplic"])
            .with_direction(Credit)
            .with_confidence(0.85),
        CategorizationRule::new("builtin-fuel", "Fuel", C::Fuel, 30)
            .with_patterns(&[
                "posto", "combustivel", "gasolina", "diesel", "etanol", "ipiranga", "shell",
                "petrobras", "abastecimento",
            ])
            .with_direction(Debit)
            .with_confidence(0.85),
        CategorizationRule::new("builtin-toll", "Tolls", C::Toll, 30)
            .with_patterns(&[
                "pedagio", "sem parar", "conectcar", "veloe", "move mais", "autoban", " ccr ",
                "ecovias", "arteris",
            ])
            .with_direction(Debit)
            .with_confidence(0.9),
        CategorizationRule::new("builtin-vehicle", "Vehicle maintenance", C::VehicleMaintenance, 30)
            .with_patterns(&[
                "auto pecas", "autopecas", "oficina", "mecanica", "pneu", "borracharia",
                "retifica", "funilaria", "lubrificante", "troca de oleo",
            ])
            .with_direction(Debit)
            .with_confidence(0.8),
        CategorizationRule::new("builtin-salary", "Payroll", C::Salary, 30)
            .with_patterns(SALARY_PATTERNS)
            .with_confidence(0.85),
        CategorizationRule::new("builtin-utilities", "Utilities", C::Utilities, 40)
            .with_patterns(&[
                "energia", "energisa", "cemig", "copel", " enel ", " light ", "celesc", "sabesp",
                "copasa", "saneamento", " agua ", "telefone", "telefonica", " vivo ", " claro ",
                " tim ", "internet",
            ])
            .with_direction(Debit)
            .with_confidence(0.8),
        CategorizationRule::new("builtin-insurance", "Insurance", C::Insurance, 40)
            .with_patterns(&[
                "seguro", "seguradora", "porto seguro", "sulamerica", "mapfre", "allianz",
                "tokio marine", "bradesco seguros",
            ])
            .with_direction(Debit)
            .with_confidence(0.85),
        CategorizationRule::new("builtin-rent", "Rent", C::Rent, 40)
            .with_patterns(&["aluguel", "locacao imovel", "condominio"])
            .with_direction(Debit)
            .with_confidence(0.85),
        CategorizationRule::new("builtin-supplier", "Supplier payment", C::SupplierPayment, 60)
            .with_patterns(&[
                "pag boleto", "pagto boleto", "pagamento boleto", "pagamento de boleto",
                "pagto fornecedor", "pagamento fornecedor", "pagto eletron", "pagto cobranca",
                "boleto",
            ])
            .with_direction(Debit)
            .with_confidence(0.7),
        CategorizationRule::new("builtin-receipt", "Customer receipt", C::CustomerReceipt, 60)
            .with_patterns(&[
                "liquidacao cobranca", "liq cobranca", "credito cobranca", "recebimento",
                "boleto recebido", "deposito",
            ])
            .with_direction(Credit)
            .with_confidence(0.7),
        CategorizationRule::new("builtin-transfer", "Transfers (PIX/TED/DOC)", C::Transfer, 70)
            .with_patterns(TRANSFER_PATTERNS)
            .with_confidence(0.75),
    ]
}

// ============================================================================
// DESCRIPTION HELPERS
// ============================================================================

/// Comparable form of a bank description.
///
/// ```text
/// "PIX-RECEBIDO 05/01/2026 *Transportes Silva*" → "pix recebido transportes silva"
/// ```
pub fn normalize_description(description: &str) -> String {
    let without_dates = DATE_RE.replace_all(description, " ");
    let folded = fold_accents(&without_dates).to_lowercase();
    let cleaned: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&cleaned)
}

/// Name fragment of a transfer-style description.
///
/// ```text
/// "PIX RECEBIDO TRANSPORTES SILVA LTDA" → Some("TRANSPORTES SILVA LTDA")
/// "TED 05/01 123456 ACME LOGISTICA"     → Some("ACME LOGISTICA")
/// "PIX 12345678900"                      → None
/// ```
pub fn extract_payee_from_description(description: &str) -> Option<String> {
    let normalized = normalize_description(description);
    let transfer_like = TRANSFER_PATTERNS
        .iter()
        .any(|p| pattern_matches(p, &normalized));
    if !transfer_like {
        return None;
    }

    let without_dates = DATE_RE.replace_all(description, " ");
    let tokens: Vec<&str> = without_dates
        .split(|c: char| c.is_whitespace() || c == '-' || c == '*' || c == ':' || c == '|')
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect();

    let is_noise = |token: &&str| {
        let key = fold_accents(token).to_lowercase();
        PAYEE_NOISE.contains(&key.as_str()) || token.chars().any(|c| c.is_ascii_digit())
    };

    let name: Vec<&str> = tokens
        .iter()
        .skip_while(|t| is_noise(*t))
        .filter(|t| !t.chars().any(|c| c.is_ascii_digit()))
        .copied()
        .collect();

    if name.iter().any(|t| t.chars().any(char::is_alphabetic)) {
        Some(name.join(" "))
    } else {
        None
    }
}

fn matches_any(description: &str, patterns: &[&str]) -> bool {
    let normalized = normalize_description(description);
    patterns.iter().any(|p| pattern_matches(p, &normalized))
}

pub fn is_pix_transaction(description: &str) -> bool {
    matches_any(description, &[" pix "])
}

pub fn is_ted_transaction(description: &str) -> bool {
    matches_any(description, &[" ted ", "transferencia eletronica disponivel"])
}

pub fn is_salary_transaction(description: &str) -> bool {
    matches_any(description, SALARY_PATTERNS)
}

pub fn is_tax_payment(description: &str) -> bool {
    matches_any(description, TAX_PATTERNS)
}

pub fn is_bank_fee(description: &str) -> bool {
    matches_any(description, FEE_PATTERNS)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn tx(description: &str, amount: Decimal) -> BankTransaction {
        BankTransaction::new(
            format!("T-{}", description.len()),
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            amount,
            description.to_string(),
        )
    }

    fn category_of(description: &str, amount: Decimal) -> TransactionCategory {
        TransactionCategorizer::new()
            .categorize(&tx(description, amount))
            .unwrap()
            .category
    }

    #[test]
    fn test_builtin_keyword_categories() {
        assert_eq!(category_of("POSTO IPIRANGA BR 101", dec!(-420)), TransactionCategory::Fuel);
        assert_eq!(category_of("PEDAGIO SEM PARAR", dec!(-35.40)), TransactionCategory::Toll);
        assert_eq!(category_of("DARF IRPJ 2026", dec!(-900)), TransactionCategory::Tax);
        assert_eq!(category_of("IOF ADICIONAL", dec!(-1.20)), TransactionCategory::Tax);
        assert_eq!(category_of("TARIFA PACOTE SERVICOS", dec!(-89.90)), TransactionCategory::BankFee);
        assert_eq!(category_of("PAGTO SALARIO JANEIRO", dec!(-3000)), TransactionCategory::Salary);
        assert_eq!(category_of("PAG BOLETO AUTO PECAS CENTRAL", dec!(-250)), TransactionCategory::VehicleMaintenance);
        assert_eq!(category_of("PAGTO ELETRON COBRANCA ENERGISA", dec!(-350.75)), TransactionCategory::Utilities);
        assert_eq!(category_of("ALUGUEL GALPAO", dec!(-5000)), TransactionCategory::Rent);
        assert_eq!(category_of("PIX RECEBIDO TRANSPORTES SILVA", dec!(1500)), TransactionCategory::Transfer);
    }

    #[test]
    fn test_keywords_match_inside_words() {
        assert_eq!(category_of("AUTOPOSTO SAO JOSE", dec!(-200)), TransactionCategory::Fuel);
        // Tax rules run first, so "imposto" is not read as a gas station
        assert_eq!(category_of("IMPOSTO RETIDO", dec!(-50)), TransactionCategory::Tax);
        // Anchored acronyms stay whole words
        assert_eq!(category_of("VENDAS BALCAO", dec!(-10)), TransactionCategory::Other);
        assert_eq!(category_of("TEDESCO LTDA", dec!(-10)), TransactionCategory::Other);
    }

    #[test]
    fn test_tax_and_fee_rules_accept_credits() {
        assert_eq!(category_of("TARIFA ESTORNO", dec!(15.00)), TransactionCategory::BankFee);
        assert_eq!(category_of("ESTORNO IOF", dec!(1.20)), TransactionCategory::Tax);
        assert_eq!(category_of("TARIFA PACOTE", dec!(-15.00)), TransactionCategory::BankFee);
    }

    #[test]
    fn test_direction_constraint() {
        // A gas station credit is not a fuel expense
        assert_ne!(category_of("POSTO IPIRANGA ESTORNO", dec!(50)), TransactionCategory::Fuel);
    }

    #[test]
    fn test_ofx_type_rules_win() {
        let categorizer = TransactionCategorizer::new();
        let transfer = tx("QUALQUER COISA", dec!(-10)).with_type(TransactionType::Xfer);
        let result = categorizer.categorize(&transfer).unwrap();

        assert_eq!(result.category, TransactionCategory::Transfer);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.rule_id.as_deref(), Some("builtin-xfer"));

        let interest = tx("CREDITO", dec!(3.21)).with_type(TransactionType::Int);
        assert_eq!(categorizer.categorize(&interest).unwrap().category, TransactionCategory::Interest);
    }

    #[test]
    fn test_fallback_is_low_confidence_other() {
        let categorizer = TransactionCategorizer::new();
        let result = categorizer.categorize(&tx("XPTO 123", dec!(-10))).unwrap();

        assert_eq!(result.category, TransactionCategory::Other);
        assert_eq!(result.confidence, 0.3);
        assert!(result.rule_id.is_none());
        assert!(categorizer.is_low_confidence(result.confidence));
    }

    #[test]
    fn test_categorization_is_idempotent() {
        let categorizer = TransactionCategorizer::new();
        let t = tx("POSTO SHELL", dec!(-100));
        assert_eq!(categorizer.categorize(&t).unwrap(), categorizer.categorize(&t).unwrap());
    }

    #[test]
    fn test_direction_mismatch_is_rejected() {
        let mut t = tx("POSTO SHELL", dec!(-100));
        t.direction = TransactionDirection::Credit;

        let result = TransactionCategorizer::new().categorize(&t);
        assert!(matches!(result, Err(StatementError::InvalidTransaction { .. })));
    }

    #[test]
    fn test_create_rule() {
        let mut categorizer = TransactionCategorizer::new();
        let before = categorizer.rule_count();

        let rule = categorizer
            .create_rule(
                CategorizationRule::new("", "Client ACME", TransactionCategory::CustomerReceipt, 5)
                    .with_patterns(&["acme"])
                    .with_direction(TransactionDirection::Credit)
                    .with_confidence(0.95),
            )
            .unwrap();

        assert_eq!(rule.id, "custom-1");
        assert_eq!(categorizer.rule_count(), before + 1);

        // Priority 5 beats the PIX transfer rule
        let result = categorizer.categorize(&tx("PIX RECEBIDO ACME LTDA", dec!(800))).unwrap();
        assert_eq!(result.category, TransactionCategory::CustomerReceipt);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_custom_rule_matches_substring() {
        let mut categorizer = TransactionCategorizer::new();
        categorizer
            .create_rule(
                CategorizationRule::new("acme", "Client ACME", TransactionCategory::CustomerReceipt, 5)
                    .with_patterns(&["acme"]),
            )
            .unwrap();

        let result = categorizer.categorize(&tx("XACME LTDA", dec!(300))).unwrap();
        assert_eq!(result.category, TransactionCategory::CustomerReceipt);
        assert_eq!(result.rule_id.as_deref(), Some("acme"));
    }

    #[test]
    fn test_direction_mismatch_falls_back_in_batches() {
        let mut broken = tx("POSTO SHELL", dec!(-100));
        broken.direction = TransactionDirection::Credit;
        let mut transactions = vec![broken, tx("TARIFA PACOTE", dec!(-10))];

        let summary = TransactionCategorizer::new()
            .categorize_all(&mut transactions)
            .unwrap();

        assert_eq!(transactions[0].category, Some(TransactionCategory::Other));
        assert_eq!(transactions[0].category_confidence, Some(0.3));
        assert_eq!(transactions[1].category, Some(TransactionCategory::BankFee));
        assert_eq!(summary.total, 2);
        assert_eq!(summary.categorized, 1);
    }

    #[test]
    fn test_create_rule_validation() {
        let mut categorizer = TransactionCategorizer::new();

        let nameless = CategorizationRule::new("x", " ", TransactionCategory::Rent, 1).with_patterns(&["a"]);
        assert!(matches!(categorizer.create_rule(nameless), Err(StatementError::InvalidRule { .. })));

        let unconstrained = CategorizationRule::new("y", "Everything", TransactionCategory::Rent, 1)
            .with_patterns(&["  "]);
        assert!(categorizer.create_rule(unconstrained).is_err());

        let duplicate = CategorizationRule::new("builtin-fuel", "Fuel again", TransactionCategory::Fuel, 1)
            .with_patterns(&["gas"]);
        assert!(categorizer.create_rule(duplicate).is_err());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut categorizer = TransactionCategorizer::new();
        let mut rule = CategorizationRule::new("c", "Clamp", TransactionCategory::Rent, 1).with_patterns(&["galpao"]);
        rule.confidence = 7.0;

        let stored = categorizer.create_rule(rule).unwrap();
        assert_eq!(stored.confidence, 1.0);
    }

    #[test]
    fn test_batch_fills_payee_and_document() {
        let transactions = vec![
            tx("PIX RECEBIDO TRANSPORTES SILVA LTDA 11.222.333/0001-81", dec!(1500)),
            tx("TARIFA PACOTE", dec!(-89.90)),
            tx("XPTO", dec!(-1)),
        ];

        let batch = TransactionCategorizer::new().categorize_batch(&transactions).unwrap();

        let first = &batch.transactions[0];
        assert_eq!(first.payee.as_deref(), Some("TRANSPORTES SILVA LTDA"));
        assert_eq!(first.payee_document.as_deref(), Some("11222333000181"));
        assert!(batch.transactions.iter().all(|t| t.category.is_some()));

        assert_eq!(batch.summary.total, 3);
        assert_eq!(batch.summary.categorized, 2);
        assert_eq!(batch.summary.low_confidence, 1);
        assert_eq!(batch.summary.by_category[&TransactionCategory::Other], 1);
        assert!((batch.summary.average_confidence - (0.75 + 0.9 + 0.3) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(
            normalize_description("PIX-RECEBIDO 05/01/2026 *Transportes  Silva*"),
            "pix recebido transportes silva"
        );
        assert_eq!(normalize_description("PEDÁGIO 05/01/26"), "pedagio");
        // Only full dates are stripped; installments and day/month stay
        assert_eq!(normalize_description("PARCELA 3/10"), "parcela 3 10");
        assert_eq!(normalize_description("COMPRA 05/01"), "compra 05 01");
        assert_eq!(normalize_description("Tarifa   Mensal"), "tarifa mensal");
    }

    #[test]
    fn test_extract_payee() {
        assert_eq!(
            extract_payee_from_description("PIX RECEBIDO TRANSPORTES SILVA LTDA").as_deref(),
            Some("TRANSPORTES SILVA LTDA")
        );
        assert_eq!(
            extract_payee_from_description("TED 05/01 123456 ACME LOGISTICA").as_deref(),
            Some("ACME LOGISTICA")
        );
        assert_eq!(
            extract_payee_from_description("PIX ENVIADO - Maria de Souza").as_deref(),
            Some("Maria de Souza")
        );
        assert_eq!(extract_payee_from_description("PIX 12345678900"), None);
        assert_eq!(extract_payee_from_description("TARIFA PACOTE"), None);
    }

    #[test]
    fn test_predicates() {
        assert!(is_pix_transaction("Pix - Recebido"));
        assert!(!is_pix_transaction("PIXAR FILMES"));
        assert!(is_ted_transaction("TED RECEBIDA"));
        assert!(!is_ted_transaction("TEDESCO LTDA"));
        assert!(is_salary_transaction("FOLHA DE PAGAMENTO"));
        assert!(is_tax_payment("PAGTO DAS SIMPLES"));
        assert!(!is_tax_payment("VENDAS"));
        assert!(is_bank_fee("TARIFA DOC"));
    }
}
