// 📑 CSV Parser - Brazilian bank exports (Itaú, Bradesco, Banco do Brasil, generic)
//
// Pipeline:
// 1. Delimiter: caller option, else sniffed from the first delimited line
// 2. Header row: first line a known layout understands (lines above it are
//    preamble, scanned for Agência/Conta)
// 3. Rows → transactions; balance marker rows and the balance column feed the
//    declared opening/closing balances
// 4. Period and summary derived from the transactions

use chrono::{NaiveDate, Utc};
use csv::{ReaderBuilder, Trim};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::config::{AccountHint, ParseOptions, DEFAULT_CSV_DATE_FORMAT};
use crate::entities::bank::{normalize_bank_code, BankRegistry};
use crate::error::{Result, StatementError};
use crate::format::CSV_DELIMITERS;
use crate::layouts::{detect_layout, AmountColumns, BankLayout, ColumnMap};
use crate::model::{
    synthetic_fit_id, BankAccountInfo, BankStatementData, BankTransaction, StatementFormat,
    TransactionType, DEFAULT_CURRENCY,
};
use crate::parser::StatementParser;
use crate::summary::{self, balance_marker, BalanceMarker};
use crate::text::{fold, non_empty};

/// Lines examined while looking for the delimiter and the header row
const HEADER_SEARCH_LINES: usize = 10;

static BRANCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"agencia\W{0,3}(\d{1,5}(?:-[\dx])?)").expect("valid branch regex")
});

static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"conta(?: corrente)?\W{0,3}(\d[\d.]*(?:-[\dx])?)").expect("valid account regex")
});

// ============================================================================
// DELIMITER SNIFFING
// ============================================================================

/// Best delimiter for one line: highest column count (≥ 2), ties broken by
/// `;` then `,` then tab.
pub fn detect_delimiter(line: &str) -> Option<char> {
    let mut best: Option<(char, usize)> = None;

    for &delimiter in CSV_DELIMITERS.iter() {
        let columns = line.split(delimiter).count();
        if columns < 2 {
            continue;
        }
        match best {
            Some((_, best_columns)) if best_columns >= columns => {}
            _ => best = Some((delimiter, columns)),
        }
    }

    best.map(|(delimiter, _)| delimiter)
}

/// At least two non-empty lines and a line with ≥ 2 columns near the top
pub fn is_valid_csv(content: &str, delimiter: char) -> bool {
    let lines: Vec<&str> = non_empty_lines(content).collect();

    lines.len() >= 2
        && lines
            .iter()
            .take(HEADER_SEARCH_LINES)
            .any(|line| line.split(delimiter).count() >= 2)
}

fn non_empty_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().filter(|l| !l.trim().is_empty())
}

fn sniff_delimiter(content: &str) -> Option<char> {
    non_empty_lines(content)
        .take(HEADER_SEARCH_LINES)
        .find_map(detect_delimiter)
}

/// Split one line with the csv crate so quoted fields survive
fn split_line(line: &str, delimiter: u8) -> Vec<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(|s| s.to_string()).collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// ROW CLASSIFICATION
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq)]
struct Preamble {
    branch_code: Option<String>,
    account_number: Option<String>,
}

fn scan_preamble(lines: &[&str]) -> Preamble {
    let mut preamble = Preamble::default();

    for line in lines {
        let folded = fold(line);
        if preamble.branch_code.is_none() {
            preamble.branch_code = BRANCH_RE
                .captures(&folded)
                .map(|c| c[1].to_ascii_uppercase());
        }
        if preamble.account_number.is_none() {
            preamble.account_number = ACCOUNT_RE
                .captures(&folded)
                .map(|c| c[1].to_ascii_uppercase());
        }
    }

    preamble
}

// ============================================================================
// PARSER
// ============================================================================

pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        CsvParser
    }

    pub fn parse_statement(
        &self,
        content: &str,
        file_name: &str,
        options: &ParseOptions,
    ) -> Result<BankStatementData> {
        options.check()?;
        let content = content.trim_start_matches('\u{feff}');

        let delimiter = match options.csv_delimiter {
            Some(d) => d,
            None => sniff_delimiter(content).ok_or_else(|| {
                StatementError::malformed(StatementFormat::Csv, "could not detect a delimiter")
            })?,
        };

        if !is_valid_csv(content, delimiter) {
            return Err(StatementError::malformed(
                StatementFormat::Csv,
                "expected a header row and at least one data row",
            ));
        }

        let lines: Vec<&str> = content.lines().collect();
        let (header_index, headers, layout, columns) = find_header(&lines, delimiter as u8)
            .ok_or_else(|| {
                StatementError::malformed(StatementFormat::Csv, "no known column layout in header")
            })?;

        tracing::debug!(
            "CSV '{}': layout {}, delimiter {:?}, header on line {}",
            file_name,
            layout.name,
            delimiter,
            header_index + 1
        );

        let preamble = scan_preamble(&lines[..header_index]);
        let body = lines[header_index + 1..].join("\n");
        let date_format = options.chrono_date_format();

        let rows = RowReader {
            layout,
            columns: &columns,
            headers: &headers,
            date_format: &date_format,
        };
        let RowsRead {
            transactions,
            opening_balance,
            closing_balance,
        } = rows.read(&body, delimiter as u8)?;

        if transactions.is_empty() {
            return Err(StatementError::malformed(
                StatementFormat::Csv,
                "no valid transaction rows",
            ));
        }

        let account = build_account(layout, &preamble, options.account.as_ref());
        let period = summary::derive_period(&transactions, Utc::now().date_naive());
        let balance = summary::derive_balance(
            &transactions,
            opening_balance,
            closing_balance,
            &account.currency,
            period.end_date,
        );

        tracing::info!(
            "Parsed CSV file '{}' ({}): {} transactions",
            file_name,
            layout.name,
            transactions.len()
        );

        Ok(BankStatementData::new(
            StatementFormat::Csv,
            file_name,
            account,
            period,
            balance,
            transactions,
        ))
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for CsvParser {
    fn parse(
        &self,
        content: &str,
        file_name: &str,
        options: &ParseOptions,
    ) -> Result<BankStatementData> {
        self.parse_statement(content, file_name, options)
    }

    fn format(&self) -> StatementFormat {
        StatementFormat::Csv
    }
}

fn find_header(
    lines: &[&str],
    delimiter: u8,
) -> Option<(usize, Vec<String>, &'static BankLayout, ColumnMap)> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .take(HEADER_SEARCH_LINES)
        .find_map(|(index, line)| {
            let headers = split_line(line, delimiter);
            detect_layout(&headers).map(|(layout, columns)| (index, headers, layout, columns))
        })
}

fn build_account(
    layout: &BankLayout,
    preamble: &Preamble,
    hint: Option<&AccountHint>,
) -> BankAccountInfo {
    let hinted_code = hint
        .and_then(|h| h.bank_code.as_deref())
        .map(|code| normalize_bank_code(code).unwrap_or_else(|| code.trim().to_string()));

    let bank_code = hinted_code
        .or_else(|| layout.bank_code.map(str::to_string))
        .unwrap_or_default();

    let pick = |hinted: Option<&String>, scanned: &Option<String>| -> String {
        hinted
            .and_then(|v| non_empty(v))
            .or_else(|| scanned.clone())
            .unwrap_or_default()
    };

    BankAccountInfo {
        bank_name: BankRegistry::global().name_for_code(&bank_code),
        branch_code: pick(hint.and_then(|h| h.branch_code.as_ref()), &preamble.branch_code),
        account_number: pick(
            hint.and_then(|h| h.account_number.as_ref()),
            &preamble.account_number,
        ),
        bank_code,
        currency: DEFAULT_CURRENCY.to_string(),
        ..BankAccountInfo::default()
    }
}

// ============================================================================
// ROW READER
// ============================================================================

struct RowReader<'a> {
    layout: &'a BankLayout,
    columns: &'a ColumnMap,
    headers: &'a [String],
    date_format: &'a str,
}

/// Rows of a CSV body, with the balances the file itself states
struct RowsRead {
    transactions: Vec<BankTransaction>,
    opening_balance: Option<Decimal>,
    closing_balance: Option<Decimal>,
}

impl RowReader<'_> {
    /// Transactions plus the opening and closing balances the file reveals.
    ///
    /// Marker rows ("Saldo Anterior", "S A L D O") win over the balance
    /// column. Files listed newest first are read from the other end.
    fn read(&self, body: &str, delimiter: u8) -> Result<RowsRead> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(body.as_bytes());

        let mut transactions = Vec::new();
        let mut declared_opening: Option<Decimal> = None;
        let mut declared_closings: Vec<Decimal> = Vec::new();
        // Balance column value after each transaction, in file order
        let mut running: Vec<Option<Decimal>> = Vec::new();

        for (row_index, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping unreadable CSV row {}: {}", row_index + 1, e);
                    continue;
                }
            };

            let cells: Vec<&str> = record.iter().collect();
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }

            let description = cell(&cells, self.columns.description);

            match balance_marker(description) {
                Some(BalanceMarker::Opening) => {
                    if declared_opening.is_none() {
                        declared_opening = self.marker_value(&cells);
                    }
                    continue;
                }
                Some(BalanceMarker::Running) => {
                    declared_closings.extend(self.marker_value(&cells));
                    continue;
                }
                None => {}
            }

            let Some(tx) = self.read_row(&cells, row_index) else {
                continue;
            };

            running.push(
                self.columns
                    .balance
                    .and_then(|i| self.layout.number_format.parse(cell(&cells, i))),
            );
            transactions.push(tx);
        }

        let newest_first = match (transactions.first(), transactions.last()) {
            (Some(first), Some(last)) => first.transaction_date > last.transaction_date,
            _ => false,
        };

        let (oldest, newest) = if newest_first {
            (transactions.len().checked_sub(1), Some(0))
        } else {
            (Some(0), transactions.len().checked_sub(1))
        };
        let balance_after = |index: Option<usize>| index.and_then(|i| running.get(i).copied().flatten());

        let running_opening = oldest
            .and_then(|i| transactions.get(i))
            .zip(balance_after(oldest))
            .map(|(tx, after)| after - tx.amount);
        let running_closing = balance_after(newest);

        let declared_closing = if newest_first {
            declared_closings.first().copied()
        } else {
            declared_closings.last().copied()
        };

        Ok(RowsRead {
            transactions,
            opening_balance: declared_opening.or(running_opening),
            closing_balance: declared_closing.or(running_closing),
        })
    }

    fn read_row(&self, cells: &[&str], row_index: usize) -> Option<BankTransaction> {
        let line = row_index + 1;
        let raw_date = cell(cells, self.columns.date);

        let Some(date) = self.parse_date(raw_date) else {
            tracing::warn!("Skipping CSV row {}: unparsable date '{}'", line, raw_date);
            return None;
        };

        let Some(amount) = self.row_amount(cells) else {
            tracing::warn!("Skipping CSV row {}: no usable amount", line);
            return None;
        };

        let description = cell(cells, self.columns.description).to_string();

        let fit_id = self
            .columns
            .fit_id
            .and_then(|i| non_empty(cell(cells, i)))
            .unwrap_or_else(|| synthetic_fit_id(date, amount, &description, row_index));

        let transaction_type = if amount < Decimal::ZERO {
            TransactionType::Debit
        } else {
            TransactionType::Credit
        };

        let mut tx = BankTransaction::new(fit_id, date, amount, description)
            .with_type(transaction_type)
            .with_reference_number(self.columns.reference.and_then(|i| non_empty(cell(cells, i))))
            .with_post_date(
                self.columns
                    .post_date
                    .and_then(|i| self.parse_date(cell(cells, i))),
            );

        for (header, value) in self.headers.iter().zip(cells.iter()) {
            if !header.is_empty() && !value.is_empty() {
                tx = tx.with_raw(header, value);
            }
        }

        Some(tx)
    }

    fn row_amount(&self, cells: &[&str]) -> Option<Decimal> {
        let format = self.layout.number_format;

        match self.columns.amount {
            AmountColumns::Signed(i) => format.parse(cell(cells, i)),
            AmountColumns::Split { credit, debit } => {
                let credit = format.parse(cell(cells, credit)).map(|v| v.abs());
                let debit = format.parse(cell(cells, debit)).map(|v| v.abs());

                match (credit, debit) {
                    (Some(c), Some(d)) => Some(c - d),
                    (Some(c), None) => Some(c),
                    (None, Some(d)) => Some(-d),
                    (None, None) => None,
                }
            }
        }
    }

    /// Value of a balance marker row: the balance column if any, else the amount
    fn marker_value(&self, cells: &[&str]) -> Option<Decimal> {
        self.columns
            .balance
            .and_then(|i| self.layout.number_format.parse(cell(cells, i)))
            .or_else(|| self.row_amount(cells))
    }

    fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        NaiveDate::parse_from_str(raw, self.date_format)
            .or_else(|_| NaiveDate::parse_from_str(raw, DEFAULT_CSV_DATE_FORMAT))
            .ok()
    }
}

fn cell<'a>(cells: &[&'a str], index: usize) -> &'a str {
    cells.get(index).copied().unwrap_or("")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionDirection;
    use rust_decimal_macros::dec;

    const ITAU_CSV: &str = include_str!("../tests/fixtures/itau_extrato.csv");
    const BRADESCO_CSV: &str = include_str!("../tests/fixtures/bradesco_extrato.csv");
    const BB_CSV: &str = include_str!("../tests/fixtures/bb_extrato.csv");

    fn parse(content: &str) -> Result<BankStatementData> {
        CsvParser::new().parse_statement(content, "extrato.csv", &ParseOptions::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c"), Some(';'));
        assert_eq!(detect_delimiter("a,b,c"), Some(','));
        assert_eq!(detect_delimiter("a\tb\tc"), Some('\t'));
        // Tie: 3 columns each, ';' wins by priority
        assert_eq!(detect_delimiter("a;b,c;d,e"), Some(';'));
        // Higher count wins regardless of priority
        assert_eq!(detect_delimiter("a,b,c;d"), Some(','));
        assert_eq!(detect_delimiter("no delimiters here"), None);
    }

    #[test]
    fn test_is_valid_csv() {
        assert!(is_valid_csv("a;b\n1;2", ';'));
        assert!(!is_valid_csv("a;b", ';'));
        assert!(!is_valid_csv("one\ntwo", ';'));
    }

    #[test]
    fn test_parse_itau() {
        let statement = parse(ITAU_CSV).unwrap();

        assert_eq!(statement.format, StatementFormat::Csv);
        assert_eq!(statement.account.bank_code, "341");
        assert_eq!(statement.account.bank_name.as_deref(), Some("Itaú Unibanco"));
        // "SALDO DO DIA" row is not a transaction
        assert_eq!(statement.transactions.len(), 3);

        let first = &statement.transactions[0];
        assert_eq!(first.transaction_date, date(2026, 1, 5));
        assert_eq!(first.amount, dec!(1500.00));
        assert_eq!(first.direction, TransactionDirection::Credit);
        assert!(first.has_synthetic_fit_id());

        assert_eq!(statement.summary.total_credits, dec!(1500.00));
        assert_eq!(statement.summary.total_debits, dec!(339.90));
        assert_eq!(statement.period.start_date, date(2026, 1, 5));
        assert_eq!(statement.period.end_date, date(2026, 1, 20));
        assert_eq!(statement.balance.opening_balance, Decimal::ZERO);
        assert_eq!(statement.balance.closing_balance, dec!(1160.10));
    }

    #[test]
    fn test_parse_bradesco_split_columns_and_preamble() {
        let statement = parse(BRADESCO_CSV).unwrap();

        assert_eq!(statement.account.bank_code, "237");
        assert_eq!(statement.account.branch_code, "0456");
        assert_eq!(statement.account.account_number, "12345-6");
        assert_eq!(statement.transactions.len(), 3);

        let ted = &statement.transactions[0];
        assert_eq!(ted.amount, dec!(4200.00));
        assert_eq!(ted.reference_number.as_deref(), Some("1234567"));

        let energy = &statement.transactions[1];
        assert_eq!(energy.amount, dec!(-350.75));
        assert!(energy.is_debit());

        assert_eq!(statement.balance.opening_balance, dec!(10000.00));
        assert_eq!(statement.balance.closing_balance, dec!(13429.25));
    }

    #[test]
    fn test_parse_bb_plain_numbers() {
        let statement = parse(BB_CSV).unwrap();

        assert_eq!(statement.account.bank_code, "001");
        assert_eq!(statement.transactions.len(), 3);

        let pix = &statement.transactions[0];
        assert_eq!(pix.amount, dec!(1500.00));
        assert_eq!(pix.post_date, Some(date(2026, 1, 2)));
        assert_eq!(pix.reference_number.as_deref(), Some("10201"));
        assert_eq!(pix.raw_data.get("Histórico").map(String::as_str), Some("Pix - Recebido"));

        assert_eq!(statement.balance.opening_balance, dec!(2500.00));
        assert_eq!(statement.balance.closing_balance, dec!(3634.50));
        assert_eq!(statement.period.start_date, date(2026, 1, 2));
    }

    #[test]
    fn test_bradesco_running_balance_without_marker() {
        let content = "Data;Histórico;Docto.;Crédito;Débito;Saldo\n\
                       03/02/2026;TED RECEBIDA;1;4.200,00;;14.200,00\n\
                       10/02/2026;TARIFA;2;;10,00;14.190,00\n";
        let statement = parse(content).unwrap();

        assert_eq!(statement.balance.opening_balance, dec!(10000.00));
        assert_eq!(statement.balance.closing_balance, dec!(14190.00));
    }

    #[test]
    fn test_declared_closing_is_kept_when_rows_are_missing() {
        // ENERGISA row dropped: the last balance column still says 13.429,25
        let content = BRADESCO_CSV
            .lines()
            .filter(|line| !line.contains("ENERGISA"))
            .collect::<Vec<_>>()
            .join("\n");
        let statement = parse(&content).unwrap();

        assert_eq!(statement.transactions.len(), 2);
        assert_eq!(statement.balance.opening_balance, dec!(10000.00));
        assert_eq!(statement.balance.closing_balance, dec!(13429.25));
        assert_ne!(
            statement.balance.opening_balance + statement.summary.net_movement,
            statement.balance.closing_balance
        );
    }

    #[test]
    fn test_newest_first_running_balance() {
        let content = "Data;Histórico;Docto.;Crédito;Débito;Saldo\n\
                       10/02/2026;TARIFA;2;;10,00;14.190,00\n\
                       03/02/2026;TED RECEBIDA;1;4.200,00;;14.200,00\n";
        let statement = parse(content).unwrap();

        assert_eq!(statement.balance.opening_balance, dec!(10000.00));
        assert_eq!(statement.balance.closing_balance, dec!(14190.00));
    }

    #[test]
    fn test_counts_add_up_on_every_fixture() {
        for content in [ITAU_CSV, BRADESCO_CSV, BB_CSV] {
            let statement = parse(content).unwrap();
            let summary = &statement.summary;

            assert_eq!(summary.credit_count + summary.debit_count, summary.total_transactions);
            assert_eq!(summary.total_transactions, statement.transactions.len());
            assert_eq!(summary.net_movement, summary.total_credits - summary.total_debits);
        }
    }

    #[test]
    fn test_synthetic_ids_are_stable_across_parses() {
        let a = parse(ITAU_CSV).unwrap();
        let b = parse(ITAU_CSV).unwrap();

        let ids_a: Vec<&str> = a.transactions.iter().map(|t| t.fit_id.as_str()).collect();
        let ids_b: Vec<&str> = b.transactions.iter().map(|t| t.fit_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_custom_date_format_and_delimiter() {
        let content = "data|lancamento|valor\n2026-03-01|PIX ENVIADO|-10,00\n";
        let options = ParseOptions {
            csv_delimiter: Some('|'),
            csv_date_format: Some("YYYY-MM-DD".to_string()),
            ..ParseOptions::default()
        };

        let statement = CsvParser::new()
            .parse_statement(content, "x.csv", &options)
            .unwrap();
        assert_eq!(statement.transactions[0].transaction_date, date(2026, 3, 1));
        assert_eq!(statement.transactions[0].amount, dec!(-10.00));
    }

    #[test]
    fn test_account_hint_overrides() {
        let options = ParseOptions {
            account: Some(AccountHint {
                bank_code: Some("0341".to_string()),
                branch_code: Some("1234".to_string()),
                account_number: Some("56789-0".to_string()),
            }),
            ..ParseOptions::default()
        };

        let statement = CsvParser::new()
            .parse_statement(ITAU_CSV, "x.csv", &options)
            .unwrap();
        assert_eq!(statement.account.bank_code, "341");
        assert_eq!(statement.account.branch_code, "1234");
        assert_eq!(statement.account.account_number, "56789-0");
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let content = "data;lancamento;valor\n\
                       05/01/2026;PIX RECEBIDO;100,00\n\
                       99/99/2026;LINHA QUEBRADA;10,00\n\
                       06/01/2026;SEM VALOR;\n";
        let statement = parse(content).unwrap();
        assert_eq!(statement.transactions.len(), 1);
    }

    #[test]
    fn test_rejects_unusable_input() {
        assert!(matches!(
            parse("just one line;with;cells"),
            Err(StatementError::MalformedContent { .. })
        ));
        assert!(matches!(
            parse("foo;bar;baz\n1;2;3\n"),
            Err(StatementError::MalformedContent { .. })
        ));
        // A single column cannot hold date, description and amount
        assert!(parse("valor\n100\n").is_err());
        assert!(parse("valor\n100\n200\n").is_err());
        // Header only: no transactions
        assert!(matches!(
            parse("data;lancamento;valor\n;;\n"),
            Err(StatementError::MalformedContent { .. })
        ));
        // Invalid options are reported as such
        let options = ParseOptions {
            csv_delimiter: Some('x'),
            ..ParseOptions::default()
        };
        assert!(matches!(
            CsvParser::new().parse_statement(ITAU_CSV, "x.csv", &options),
            Err(StatementError::InvalidOptions(_))
        ));
    }
}
