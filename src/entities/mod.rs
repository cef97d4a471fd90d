// Entity Models
// Reference data shared by the parsers and the validator.

pub mod bank;

pub use bank::{normalize_bank_code, Bank, BankRegistry};
