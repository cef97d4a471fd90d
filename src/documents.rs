// 🪪 Brazilian Documents - CNPJ/CPF checksums and bank account shape
//
// Both documents carry two mod-11 check digits:
//   digit = 0 if (Σ dᵢ·wᵢ mod 11) < 2, else 11 − remainder

use once_cell::sync::Lazy;
use regex::Regex;

const CNPJ_WEIGHTS_FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

static DOCUMENT_CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d./-]{9,17}\d").expect("valid document regex"));

static BRANCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,5}(-[\dxX])?$").expect("valid branch regex"));

static ACCOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,13}(-[\dxX])?$").expect("valid account regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Cpf,
    Cnpj,
}

fn digits_of(document: &str) -> Vec<u32> {
    document.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

/// Formatting ("11.222.333/0001-81") is ignored; anything but 14 digits fails.
pub fn validate_cnpj(cnpj: &str) -> bool {
    if cnpj.chars().any(|c| c.is_alphabetic()) {
        return false;
    }

    let digits = digits_of(cnpj);
    if digits.len() != 14 || all_same(&digits) {
        return false;
    }

    check_digit(&digits[..12], &CNPJ_WEIGHTS_FIRST) == digits[12]
        && check_digit(&digits[..13], &CNPJ_WEIGHTS_SECOND) == digits[13]
}

pub fn validate_cpf(cpf: &str) -> bool {
    if cpf.chars().any(|c| c.is_alphabetic()) {
        return false;
    }

    let digits = digits_of(cpf);
    if digits.len() != 11 || all_same(&digits) {
        return false;
    }

    let first_weights: Vec<u32> = (2..=10).rev().collect();
    let second_weights: Vec<u32> = (2..=11).rev().collect();

    check_digit(&digits[..9], &first_weights) == digits[9]
        && check_digit(&digits[..10], &second_weights) == digits[10]
}

/// Validate a CPF or CNPJ, picking the rule by digit count
pub fn validate_document(document: &str) -> Option<DocumentKind> {
    match digits_of(document).len() {
        11 if validate_cpf(document) => Some(DocumentKind::Cpf),
        14 if validate_cnpj(document) => Some(DocumentKind::Cnpj),
        _ => None,
    }
}

/// Shape check for a Brazilian bank account.
///
/// Bank code must be exactly 3 digits. Branch (optional) and account are
/// digits with an optional `-` check digit, which may be `X`.
pub fn validate_brazilian_account(bank_code: &str, branch_code: &str, account_number: &str) -> bool {
    let bank_code = bank_code.trim();
    if bank_code.len() != 3 || !bank_code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let branch: String = branch_code.chars().filter(|c| !c.is_whitespace()).collect();
    if !branch.is_empty() && !BRANCH_RE.is_match(&branch) {
        return false;
    }

    let account: String = account_number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect();

    ACCOUNT_RE.is_match(&account)
}

/// First checksum-valid CNPJ or CPF inside free text, as bare digits
pub fn extract_document_from_description(description: &str) -> Option<String> {
    DOCUMENT_CANDIDATE_RE
        .find_iter(description)
        .map(|m| m.as_str())
        .find(|candidate| validate_document(candidate).is_some())
        .map(|candidate| candidate.chars().filter(|c| c.is_ascii_digit()).collect())
}
