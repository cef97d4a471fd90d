// 🗂️ CSV Bank Layouts - which column means what, per bank
//
// Layouts are matched by header NAME (accent/case-insensitive), never by
// position. Detection order matters: the more specific layouts go first and
// the generic layout catches everything else.
//
//   Bradesco → Data;Histórico;Docto.;Crédito;Débito;Saldo
//   BB       → Data,Dependência Origem,Histórico,Data do Balancete,Número do documento,Valor
//   Itaú     → data;lancamento;ag./origem;valor
//   Generic  → any date/description/amount trio we recognise

use crate::amount::NumberFormat;
use crate::text::{collapse_whitespace, fold};

/// Where the amount lives in a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountColumns {
    /// One signed column
    Signed(usize),
    /// Separate credit and debit columns, sign taken from the populated one
    Split { credit: usize, debit: usize },
}

/// Column indices resolved against a concrete header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub description: usize,
    pub amount: AmountColumns,
    pub reference: Option<usize>,
    pub fit_id: Option<usize>,
    pub post_date: Option<usize>,
    pub balance: Option<usize>,
}

/// Header aliases for one bank export
#[derive(Debug)]
pub struct BankLayout {
    pub name: &'static str,
    /// FEBRABAN code the export belongs to (unknown for the generic layout)
    pub bank_code: Option<&'static str>,
    pub number_format: NumberFormat,
    /// Headers that must all be present for this layout to apply
    required: &'static [&'static str],
    date: &'static [&'static str],
    description: &'static [&'static str],
    amount: &'static [&'static str],
    credit: &'static [&'static str],
    debit: &'static [&'static str],
    reference: &'static [&'static str],
    fit_id: &'static [&'static str],
    post_date: &'static [&'static str],
    balance: &'static [&'static str],
}

pub static BRADESCO: BankLayout = BankLayout {
    name: "Bradesco",
    bank_code: Some("237"),
    number_format: NumberFormat::Brazilian,
    required: &["historico", "credito", "debito"],
    date: &["data"],
    description: &["historico"],
    amount: &[],
    credit: &["credito"],
    debit: &["debito"],
    reference: &["docto", "documento"],
    fit_id: &[],
    post_date: &[],
    balance: &["saldo"],
};

pub static BANCO_DO_BRASIL: BankLayout = BankLayout {
    name: "Banco do Brasil",
    bank_code: Some("001"),
    number_format: NumberFormat::Plain,
    required: &["historico", "data do balancete", "valor"],
    date: &["data"],
    description: &["historico"],
    amount: &["valor"],
    credit: &[],
    debit: &[],
    reference: &["numero do documento"],
    fit_id: &[],
    post_date: &["data do balancete"],
    balance: &[],
};

pub static ITAU: BankLayout = BankLayout {
    name: "Itaú",
    bank_code: Some("341"),
    number_format: NumberFormat::Brazilian,
    required: &["lancamento", "valor"],
    date: &["data"],
    description: &["lancamento"],
    amount: &["valor"],
    credit: &[],
    debit: &[],
    reference: &[],
    fit_id: &[],
    post_date: &[],
    balance: &[],
};

pub static GENERIC: BankLayout = BankLayout {
    name: "Generic",
    bank_code: None,
    number_format: NumberFormat::Auto,
    required: &[],
    date: &[
        "data",
        "date",
        "data lancamento",
        "data do lancamento",
        "data movimento",
        "data da transacao",
        "dt",
    ],
    description: &[
        "descricao",
        "historico",
        "lancamento",
        "description",
        "memo",
        "detalhes",
        "estabelecimento",
    ],
    amount: &["valor", "amount", "valor lancamento", "montante", "value"],
    credit: &["credito", "entrada", "credit"],
    debit: &["debito", "saida", "debit"],
    reference: &["documento", "docto", "numero do documento", "referencia", "reference"],
    fit_id: &["fitid", "id", "identificador", "id transacao"],
    post_date: &["data do balancete", "data compensacao"],
    balance: &["saldo", "balance"],
};

/// Detection order
pub static LAYOUTS: [&BankLayout; 4] = [&BRADESCO, &BANCO_DO_BRASIL, &ITAU, &GENERIC];

/// Comparison key for a header cell: "Crédito (R$)" → "credito", "Docto." → "docto"
pub fn header_key(header: &str) -> String {
    let folded = fold(header).replace("r$", "");
    let cleaned: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&cleaned)
}

impl BankLayout {
    /// Map this layout onto `headers`, or `None` when it does not apply
    pub fn resolve(&self, headers: &[String]) -> Option<ColumnMap> {
        let keys: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
        let find = |aliases: &[&str]| -> Option<usize> {
            aliases
                .iter()
                .find_map(|alias| keys.iter().position(|k| k == alias))
        };

        if !self.required.iter().all(|r| keys.iter().any(|k| k == r)) {
            return None;
        }

        let date = find(self.date)?;
        let description = find(self.description)?;

        let amount = match find(self.amount) {
            Some(index) => AmountColumns::Signed(index),
            None => AmountColumns::Split {
                credit: find(self.credit)?,
                debit: find(self.debit)?,
            },
        };

        Some(ColumnMap {
            date,
            description,
            amount,
            reference: find(self.reference),
            fit_id: find(self.fit_id),
            post_date: find(self.post_date),
            balance: find(self.balance),
        })
    }
}

/// First layout (in detection order) that understands `headers`
pub fn detect_layout(headers: &[String]) -> Option<(&'static BankLayout, ColumnMap)> {
    LAYOUTS
        .iter()
        .find_map(|layout| layout.resolve(headers).map(|map| (*layout, map)))
}

// ============================================================================
// TESTS
// ============================================================================
