// 📄 OFX/QFX Parser - SGML (1.x) and XML (2.x) statement files
//
// We parse the subset a bank statement needs:
// - BANKACCTFROM / CCACCTFROM account info and CURDEF
// - BANKTRANLIST DTSTART/DTEND period
// - STMTTRN blocks (TRNTYPE, DTPOSTED, DTAVAIL, TRNAMT, FITID, CHECKNUM, REFNUM, NAME, MEMO)
// - LEDGERBAL closing balance
// - "SALDO ANTERIOR" entries some Brazilian banks use for the opening balance
//
// SGML leaf elements have no closing tags, so values run until the next '<'
// or end of line.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::ops::Range;

use crate::amount::NumberFormat;
use crate::config::ParseOptions;
use crate::entities::bank::{normalize_bank_code, BankRegistry};
use crate::error::{Result, StatementError};
use crate::model::{
    synthetic_fit_id, AccountType, Balance, BankAccountInfo, BankStatementData, BankTransaction,
    Period, StatementFormat, TransactionType, DEFAULT_CURRENCY,
};
use crate::parser::StatementParser;
use crate::summary::{self, balance_marker, BalanceMarker};
use crate::text::non_empty;

// ============================================================================
// TAG SCANNER
// ============================================================================

/// Case-insensitive view over an OFX document.
///
/// `upper` has the same byte layout as `text` (ASCII uppercasing keeps
/// lengths), so offsets found in one are valid in the other.
struct OfxDocument<'a> {
    text: &'a str,
    upper: String,
}

impl<'a> OfxDocument<'a> {
    fn new(text: &'a str) -> Self {
        OfxDocument {
            text,
            upper: text.to_ascii_uppercase(),
        }
    }

    fn find(&self, needle: &str, within: &Range<usize>) -> Option<usize> {
        self.upper[within.clone()]
            .find(needle)
            .map(|pos| within.start + pos)
    }

    /// Body of the first `<TAG>...</TAG>` aggregate inside `within`.
    /// Without a closing tag the block runs to the end of `within`.
    fn block(&self, tag: &str, within: &Range<usize>) -> Option<Range<usize>> {
        let open = format!("<{}>", tag);
        let close = format!("</{}>", tag);

        let start = self.find(&open, within)? + open.len();
        let rest = start..within.end;
        let end = self.find(&close, &rest).unwrap_or(within.end);

        Some(start..end)
    }

    /// Bodies of every `<TAG>` aggregate inside `within`
    fn blocks(&self, tag: &str, within: &Range<usize>) -> Vec<Range<usize>> {
        let open = format!("<{}>", tag);
        let close = format!("</{}>", tag);
        let mut found = Vec::new();
        let mut cursor = within.start;

        while cursor < within.end {
            let rest = cursor..within.end;
            let Some(pos) = self.find(&open, &rest) else {
                break;
            };
            let start = pos + open.len();
            let after_open = start..within.end;

            // Unclosed aggregate: stop at the next sibling opening tag
            let end = self
                .find(&close, &after_open)
                .or_else(|| self.find(&open, &after_open))
                .unwrap_or(within.end);

            found.push(start..end);
            cursor = end;
        }

        found
    }

    /// Text value of leaf element `<TAG>` inside `within`
    fn value(&self, tag: &str, within: &Range<usize>) -> Option<String> {
        let open = format!("<{}>", tag);
        let start = self.find(&open, within)? + open.len();
        let raw = &self.text[start..within.end];

        let end = raw
            .find(|c: char| c == '<' || c == '\n' || c == '\r')
            .unwrap_or(raw.len());

        non_empty(&decode_entities(&raw[..end]))
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

// ============================================================================
// DATES
// ============================================================================

/// Parse an OFX date `YYYYMMDD[HHMMSS[.XXX]][[±H[.F]][:TZ]]`.
///
/// Returns the calendar date as written by the bank and the instant
/// normalized to UTC. Missing offsets mean GMT.
pub fn parse_ofx_datetime(raw: &str) -> Option<(NaiveDate, DateTime<Utc>)> {
    let raw = raw.trim();
    let (main, zone) = match raw.split_once('[') {
        Some((main, zone)) => (main.trim(), Some(zone.trim_end_matches(']'))),
        None => (raw, None),
    };

    let digits: String = main.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 8 {
        return None;
    }

    let year: i32 = digits[0..4].parse().ok()?;
    let month: u32 = digits[4..6].parse().ok()?;
    let day: u32 = digits[6..8].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let field = |range: Range<usize>| -> Option<u32> {
        digits.get(range).map(|s| s.parse().ok()).unwrap_or(Some(0))
    };
    let time = NaiveTime::from_hms_opt(field(8..10)?, field(10..12)?, field(12..14)?)?;
    let local = NaiveDateTime::new(date, time);

    let offset_seconds = match zone {
        Some(zone) => parse_gmt_offset(zone)?,
        None => 0,
    };
    let offset = FixedOffset::east_opt(offset_seconds)?;
    let instant = offset
        .from_local_datetime(&local)
        .single()?
        .with_timezone(&Utc);

    Some((date, instant))
}

/// "-3:BRT" → -10800, "+5.30" → 19800 (hours with fractional minutes)
fn parse_gmt_offset(zone: &str) -> Option<i32> {
    let offset = zone.split(':').next()?.trim();
    if offset.is_empty() {
        return Some(0);
    }

    let (sign, magnitude) = match offset.as_bytes()[0] {
        b'-' => (-1, &offset[1..]),
        b'+' => (1, &offset[1..]),
        _ => (1, offset),
    };

    let (hours, minutes) = match magnitude.split_once('.') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (magnitude.parse::<i32>().ok()?, 0),
    };

    if hours > 14 || minutes >= 60 {
        return None;
    }

    Some(sign * (hours * 3600 + minutes * 60))
}

fn parse_ofx_date(raw: &str) -> Option<NaiveDate> {
    parse_ofx_datetime(raw).map(|(date, _)| date)
}

// ============================================================================
// PARSER
// ============================================================================

/// OFX and QFX share one parser; only the reported format differs.
pub struct OfxParser {
    format: StatementFormat,
}

impl OfxParser {
    pub fn new() -> Self {
        OfxParser {
            format: StatementFormat::Ofx,
        }
    }

    pub fn qfx() -> Self {
        OfxParser {
            format: StatementFormat::Qfx,
        }
    }

    pub fn parse_statement(&self, content: &str, file_name: &str) -> Result<BankStatementData> {
        let doc = OfxDocument::new(content);

        let ofx_start = doc
            .upper
            .find("<OFX")
            .ok_or_else(|| StatementError::malformed(self.format, "missing <OFX> root element"))?;
        let body = ofx_start..content.len();

        let account = self.parse_account(&doc, &body);
        let (transactions, declared_opening) = self.parse_transactions(&doc, &body)?;

        let (first, last) = summary::date_range(&transactions).ok_or_else(|| {
            StatementError::malformed(self.format, "no <STMTTRN> entry could be parsed")
        })?;

        let tran_list = doc.block("BANKTRANLIST", &body).unwrap_or(body.clone());
        let period = Period {
            start_date: doc
                .value("DTSTART", &tran_list)
                .and_then(|v| parse_ofx_date(&v))
                .unwrap_or(first),
            end_date: doc
                .value("DTEND", &tran_list)
                .and_then(|v| parse_ofx_date(&v))
                .unwrap_or(last),
            generated_at: Utc::now(),
        };

        let balance = self.parse_balance(
            &doc,
            &body,
            &transactions,
            declared_opening,
            &account.currency,
            &period,
        )?;

        tracing::info!(
            "Parsed {} file '{}': {} transactions, account {}",
            self.format,
            file_name,
            transactions.len(),
            account.account_number
        );

        Ok(BankStatementData::new(
            self.format,
            file_name,
            account,
            period,
            balance,
            transactions,
        ))
    }

    fn parse_account(&self, doc: &OfxDocument, body: &Range<usize>) -> BankAccountInfo {
        let currency = doc
            .value("CURDEF", body)
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let (container, credit_card) = match doc.block("BANKACCTFROM", body) {
            Some(block) => (block, false),
            None => match doc.block("CCACCTFROM", body) {
                Some(block) => (block, true),
                None => (body.clone(), false),
            },
        };

        let raw_bank_id = doc.value("BANKID", &container).unwrap_or_default();
        let bank_code = normalize_bank_code(&raw_bank_id).unwrap_or(raw_bank_id);
        let bank_name = BankRegistry::global().name_for_code(&bank_code);

        let account_type = if credit_card {
            AccountType::CreditLine
        } else {
            doc.value("ACCTTYPE", &container)
                .map(|t| AccountType::from_ofx(&t))
                .unwrap_or_default()
        };

        BankAccountInfo {
            bank_code,
            bank_name,
            branch_code: doc.value("BRANCHID", &container).unwrap_or_default(),
            account_number: doc.value("ACCTID", &container).unwrap_or_default(),
            account_type,
            currency,
        }
    }

    /// Statement entries, plus the opening balance when one is posted as an entry
    fn parse_transactions(
        &self,
        doc: &OfxDocument,
        body: &Range<usize>,
    ) -> Result<(Vec<BankTransaction>, Option<Decimal>)> {
        let blocks = doc.blocks("STMTTRN", body);
        if blocks.is_empty() {
            return Err(StatementError::malformed(
                self.format,
                "statement contains no <STMTTRN> entries",
            ));
        }

        let mut transactions = Vec::with_capacity(blocks.len());
        let mut declared_opening = None;

        for (index, block) in blocks.iter().enumerate() {
            let Some(tx) = self.parse_transaction(doc, block, index) else {
                tracing::warn!("Skipping unparsable <STMTTRN> #{}", index + 1);
                continue;
            };

            match balance_marker(&tx.description) {
                Some(BalanceMarker::Opening) => {
                    declared_opening.get_or_insert(tx.amount);
                }
                Some(BalanceMarker::Running) => {
                    tracing::debug!("Skipping balance entry <STMTTRN> #{}", index + 1);
                }
                None => transactions.push(tx),
            }
        }

        Ok((transactions, declared_opening))
    }

    fn parse_transaction(
        &self,
        doc: &OfxDocument,
        block: &Range<usize>,
        index: usize,
    ) -> Option<BankTransaction> {
        let trn_type = doc.value("TRNTYPE", block);
        let posted_raw = doc.value("DTPOSTED", block)?;
        let amount_raw = doc.value("TRNAMT", block)?;

        let (transaction_date, posted_at) = parse_ofx_datetime(&posted_raw)?;
        let amount = NumberFormat::Auto.parse(&amount_raw)?;

        let transaction_type = trn_type
            .as_deref()
            .map(TransactionType::from_ofx)
            .unwrap_or(TransactionType::Other);

        // CREDIT/DEBIT tags decide direction; the amount sign follows them
        let amount = match transaction_type {
            TransactionType::Credit => amount.abs(),
            TransactionType::Debit => -amount.abs(),
            _ => amount,
        };

        let memo = doc.value("MEMO", block);
        let name = doc.value("NAME", block);
        let description = memo.clone().or_else(|| name.clone()).unwrap_or_default();

        let fit_id = doc
            .value("FITID", block)
            .unwrap_or_else(|| synthetic_fit_id(transaction_date, amount, &description, index));

        let mut tx = BankTransaction::new(fit_id, transaction_date, amount, description)
            .with_type(transaction_type)
            .with_memo(memo)
            .with_payee(name)
            .with_check_number(doc.value("CHECKNUM", block))
            .with_reference_number(doc.value("REFNUM", block))
            .with_post_date(doc.value("DTAVAIL", block).and_then(|v| parse_ofx_date(&v)))
            .with_posted_at(Some(posted_at));

        for tag in ["TRNTYPE", "DTPOSTED", "TRNAMT", "FITID", "NAME", "MEMO", "CHECKNUM", "REFNUM"] {
            if let Some(value) = doc.value(tag, block) {
                tx = tx.with_raw(tag, &value);
            }
        }

        Some(tx)
    }

    fn parse_balance(
        &self,
        doc: &OfxDocument,
        body: &Range<usize>,
        transactions: &[BankTransaction],
        declared_opening: Option<Decimal>,
        currency: &str,
        period: &Period,
    ) -> Result<Balance> {
        let ledger = doc.block("LEDGERBAL", body);

        let closing_balance = match ledger.as_ref().and_then(|l| doc.value("BALAMT", l)) {
            Some(raw) => Some(NumberFormat::Auto.parse(&raw).ok_or_else(|| {
                StatementError::malformed(self.format, format!("invalid <BALAMT> '{}'", raw))
            })?),
            None => None,
        };

        let as_of_date = ledger
            .as_ref()
            .and_then(|l| doc.value("DTASOF", l))
            .and_then(|v| parse_ofx_date(&v))
            .unwrap_or(period.end_date);

        // Without a "SALDO ANTERIOR" entry the opening is backed out of LEDGERBAL
        Ok(summary::derive_balance(
            transactions,
            declared_opening,
            closing_balance,
            currency,
            as_of_date,
        ))
    }
}

impl Default for OfxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for OfxParser {
    fn parse(
        &self,
        content: &str,
        file_name: &str,
        _options: &ParseOptions,
    ) -> Result<BankStatementData> {
        self.parse_statement(content, file_name)
    }

    fn format(&self) -> StatementFormat {
        self.format
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use rust_decimal_macros::dec;

    const ITAU_OFX: &str = include_str!("../tests/fixtures/itau_extrato.ofx");
    const XML_OFX: &str = include_str!("../tests/fixtures/bradesco_extrato_v2.ofx");

    #[test]
    fn test_parse_itau_sgml() {
        let statement = OfxParser::new()
            .parse_statement(ITAU_OFX, "itau_extrato.ofx")
            .unwrap();

        assert_eq!(statement.format, StatementFormat::Ofx);
        assert_eq!(statement.transactions.len(), 3);
        assert_eq!(statement.account.bank_code, "341");
        assert_eq!(statement.account.bank_name.as_deref(), Some("Itaú Unibanco"));
        assert_eq!(statement.account.branch_code, "1234");
        assert_eq!(statement.account.account_number, "56789-0");
        assert_eq!(statement.account.currency, "BRL");

        assert_eq!(statement.summary.total_credits, dec!(1500.00));
        assert_eq!(statement.summary.total_debits, dec!(339.90));
        assert_eq!(statement.summary.net_movement, dec!(1160.10));

        assert_eq!(statement.balance.closing_balance, dec!(5160.10));
        assert_eq!(statement.balance.opening_balance, dec!(4000.00));
        assert_eq!(statement.period.start_date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(statement.period.end_date, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
    }

    #[test]
    fn test_transaction_fields() {
        let statement = OfxParser::new()
            .parse_statement(ITAU_OFX, "itau_extrato.ofx")
            .unwrap();
        let first = &statement.transactions[0];

        assert_eq!(first.fit_id, "202601050001");
        assert_eq!(first.amount, dec!(1500.00));
        assert!(first.is_credit());
        assert_eq!(first.transaction_type, TransactionType::Credit);
        assert_eq!(first.description, "PIX RECEBIDO TRANSPORTES SILVA LTDA");
        assert_eq!(first.raw_data.get("FITID").map(String::as_str), Some("202601050001"));

        let fee = &statement.transactions[2];
        assert!(fee.is_debit());
        assert_eq!(fee.transaction_type, TransactionType::Debit);
        assert_eq!(fee.amount, dec!(-89.90));
    }

    #[test]
    fn test_timezone_is_normalized_to_utc() {
        let (date, instant) = parse_ofx_datetime("20260105220000[-3:BRT]").unwrap();

        // Bank's calendar date stays the 5th, the instant moves to the 6th UTC
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_eq!(instant.date_naive(), NaiveDate::from_ymd_opt(2026, 1, 6).unwrap());
        assert_eq!(instant.hour(), 1);
    }

    #[test]
    fn test_date_variants() {
        let (date, instant) = parse_ofx_datetime("20260105").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_eq!(instant.hour(), 0);

        let (_, instant) = parse_ofx_datetime("20260105120000.000[+5.30:IST]").unwrap();
        assert_eq!(instant.hour(), 6);
        assert_eq!(instant.minute(), 30);

        assert!(parse_ofx_datetime("2026").is_none());
        assert!(parse_ofx_datetime("20261345").is_none());
    }

    #[test]
    fn test_parse_xml_ofx_with_comma_amounts() {
        let statement = OfxParser::new()
            .parse_statement(XML_OFX, "bradesco.ofx")
            .unwrap();

        assert_eq!(statement.account.bank_code, "237");
        assert_eq!(statement.transactions.len(), 2);
        assert_eq!(statement.transactions[0].amount, dec!(-350.75));
        assert_eq!(statement.transactions[0].transaction_type, TransactionType::Payment);
        assert_eq!(statement.transactions[0].check_number.as_deref(), Some("000123"));
        assert_eq!(statement.transactions[1].payee.as_deref(), Some("ACME LOGISTICA"));
        assert_eq!(statement.transactions[1].description, "ACME LOGISTICA");
    }

    #[test]
    fn test_missing_fitid_gets_synthetic_id() {
        let content = "<OFX><BANKTRANLIST>\n<STMTTRN>\n<TRNTYPE>FEE\n<DTPOSTED>20260110\n\
                       <TRNAMT>-12.50\n<MEMO>TARIFA PACOTE\n</STMTTRN>\n</BANKTRANLIST></OFX>";

        let first = OfxParser::new().parse_statement(content, "a.ofx").unwrap();
        let second = OfxParser::new().parse_statement(content, "a.ofx").unwrap();

        assert!(first.transactions[0].has_synthetic_fit_id());
        assert_eq!(first.transactions[0].fit_id, second.transactions[0].fit_id);
        // No LEDGERBAL: closing derived from zero opening
        assert_eq!(first.balance.closing_balance, dec!(-12.50));
    }

    #[test]
    fn test_opening_balance_entry_is_not_a_transaction() {
        let content = "<OFX>\n<BANKTRANLIST>\n\
                       <STMTTRN>\n<TRNTYPE>OTHER\n<DTPOSTED>20260101\n<TRNAMT>4000.00\n<FITID>S0\n<MEMO>SALDO ANTERIOR\n</STMTTRN>\n\
                       <STMTTRN>\n<TRNTYPE>CREDIT\n<DTPOSTED>20260105\n<TRNAMT>1500.00\n<FITID>A1\n<MEMO>PIX RECEBIDO\n</STMTTRN>\n\
                       <STMTTRN>\n<TRNTYPE>OTHER\n<DTPOSTED>20260105\n<TRNAMT>0\n<FITID>S1\n<MEMO>SALDO DO DIA\n</STMTTRN>\n\
                       </BANKTRANLIST>\n<LEDGERBAL>\n<BALAMT>5160.10\n<DTASOF>20260131\n</LEDGERBAL>\n</OFX>";

        let statement = OfxParser::new().parse_statement(content, "a.ofx").unwrap();

        assert_eq!(statement.transactions.len(), 1);
        assert_eq!(statement.balance.opening_balance, dec!(4000.00));
        // Two entries are missing from this export; both declared values are kept
        assert_eq!(statement.balance.closing_balance, dec!(5160.10));
        assert_ne!(
            statement.balance.opening_balance + statement.summary.net_movement,
            statement.balance.closing_balance
        );
    }

    #[test]
    fn test_debit_tag_forces_negative_amount() {
        let content = "<OFX>\n<STMTTRN>\n<TRNTYPE>DEBIT\n<DTPOSTED>20260110\n\
                       <TRNAMT>45.00\n<FITID>X1\n<MEMO>POSTO IPIRANGA\n</STMTTRN>\n</OFX>";

        let statement = OfxParser::new().parse_statement(content, "a.ofx").unwrap();
        assert_eq!(statement.transactions[0].amount, dec!(-45.00));
        assert!(statement.transactions[0].direction_agrees());
    }

    #[test]
    fn test_no_transactions_is_malformed() {
        let content = "<OFX>\n<BANKACCTFROM>\n<ACCTID>123\n</BANKACCTFROM>\n</OFX>";
        let result = OfxParser::new().parse_statement(content, "a.ofx");
        assert!(matches!(result, Err(StatementError::MalformedContent { .. })));

        let result = OfxParser::qfx().parse_statement("just text", "a.qfx");
        assert!(matches!(
            result,
            Err(StatementError::MalformedContent { format: StatementFormat::Qfx, .. })
        ));
    }

    #[test]
    fn test_all_entries_unparsable_is_malformed() {
        let content = "<OFX>\n<STMTTRN>\n<TRNTYPE>DEBIT\n<DTPOSTED>garbage\n\
                       <TRNAMT>1.00\n</STMTTRN>\n</OFX>";
        assert!(OfxParser::new().parse_statement(content, "a.ofx").is_err());
    }
}
