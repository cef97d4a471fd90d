// 📊 Statement Summary - totals, period and balance folded from transactions
//
// Formula used for derived balances:
//   opening_balance + Σ amount = closing_balance
//
// A balance declared in the file is kept over a derived one.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::model::{Balance, BankTransaction, Period, Summary, TransactionDirection};
use crate::text::fold;

/// Balance rows Brazilian banks mix in with the transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceMarker {
    /// "Saldo Anterior": the opening balance
    Opening,
    /// "S A L D O", "Saldo do dia", "Saldo final": balance after the rows above it
    Running,
}

/// Classify a description as a balance row, if it is one
pub fn balance_marker(description: &str) -> Option<BalanceMarker> {
    let folded = fold(description);

    if folded.starts_with("saldo anterior") {
        Some(BalanceMarker::Opening)
    } else if folded == "saldo"
        || folded.starts_with("s a l d o")
        || folded.starts_with("saldo do dia")
        || folded.starts_with("saldo final")
        || folded.starts_with("saldo total")
    {
        Some(BalanceMarker::Running)
    } else {
        None
    }
}

/// Fold transactions into counts and totals.
///
/// Credits and debits are summed as magnitudes; `by_type` totals keep the sign.
pub fn compute_summary(transactions: &[BankTransaction]) -> Summary {
    let mut summary = Summary::default();

    for tx in transactions {
        summary.total_transactions += 1;

        match tx.direction {
            TransactionDirection::Credit => {
                summary.credit_count += 1;
                summary.total_credits += tx.amount.abs();
            }
            TransactionDirection::Debit => {
                summary.debit_count += 1;
                summary.total_debits += tx.amount.abs();
            }
        }

        let entry = summary.by_type.entry(tx.transaction_type).or_default();
        entry.count += 1;
        entry.total += tx.amount;
    }

    summary.net_movement = summary.total_credits - summary.total_debits;
    summary.average_transaction_amount = if summary.total_transactions > 0 {
        (summary.net_movement / Decimal::from(summary.total_transactions)).round_dp(2)
    } else {
        Decimal::ZERO
    };

    summary
}

/// Earliest and latest transaction dates, or `None` for an empty list.
pub fn date_range(transactions: &[BankTransaction]) -> Option<(NaiveDate, NaiveDate)> {
    let start = transactions.iter().map(|tx| tx.transaction_date).min()?;
    let end = transactions.iter().map(|tx| tx.transaction_date).max()?;
    Some((start, end))
}

/// Period spanning the transactions, falling back to `today` when empty.
pub fn derive_period(transactions: &[BankTransaction], today: NaiveDate) -> Period {
    let (start_date, end_date) = date_range(transactions).unwrap_or((today, today));

    Period {
        start_date,
        end_date,
        generated_at: Utc::now(),
    }
}

pub fn net_amount(transactions: &[BankTransaction]) -> Decimal {
    transactions.iter().map(|tx| tx.amount).sum()
}

/// Balance from whatever the file declared.
///
/// A missing opening is backed out of the declared closing (or is zero when
/// neither is known); a missing closing is `opening + Σ amount`.
pub fn derive_balance(
    transactions: &[BankTransaction],
    opening_balance: Option<Decimal>,
    closing_balance: Option<Decimal>,
    currency: &str,
    as_of_date: NaiveDate,
) -> Balance {
    let net = net_amount(transactions);
    let (opening_balance, closing_balance) = match (opening_balance, closing_balance) {
        (Some(opening), Some(closing)) => (opening, closing),
        (Some(opening), None) => (opening, opening + net),
        (None, Some(closing)) => (closing - net, closing),
        (None, None) => (Decimal::ZERO, net),
    };

    Balance {
        opening_balance,
        closing_balance,
        currency: currency.to_string(),
        as_of_date,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionType;
    use rust_decimal_macros::dec;

    fn tx(day: u32, amount: Decimal, tx_type: TransactionType) -> BankTransaction {
        BankTransaction::new(
            format!("T{}", day),
            NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            amount,
            "Test transaction".to_string(),
        )
        .with_type(tx_type)
    }

    #[test]
    fn test_summary_totals() {
        let transactions = vec![
            tx(5, dec!(1500.00), TransactionType::Credit),
            tx(6, dec!(-250.00), TransactionType::Payment),
            tx(7, dec!(-89.90), TransactionType::Pos),
        ];

        let summary = compute_summary(&transactions);

        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.credit_count, 1);
        assert_eq!(summary.debit_count, 2);
        assert_eq!(summary.total_credits, dec!(1500.00));
        assert_eq!(summary.total_debits, dec!(339.90));
        assert_eq!(summary.net_movement, dec!(1160.10));
        assert_eq!(summary.average_transaction_amount, dec!(386.70));
        assert_eq!(summary.by_type[&TransactionType::Pos].count, 1);
        assert_eq!(summary.by_type[&TransactionType::Pos].total, dec!(-89.90));
    }

    #[test]
    fn test_empty_summary_has_zero_average() {
        let summary = compute_summary(&[]);
        assert_eq!(summary.total_transactions, 0);
        assert_eq!(summary.average_transaction_amount, Decimal::ZERO);
    }

    #[test]
    fn test_derive_period_and_balance() {
        let transactions = vec![
            tx(9, dec!(100.00), TransactionType::Credit),
            tx(3, dec!(-40.00), TransactionType::Debit),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();

        let period = derive_period(&transactions, today);
        assert_eq!(period.start_date, NaiveDate::from_ymd_opt(2026, 1, 3).unwrap());
        assert_eq!(period.end_date, NaiveDate::from_ymd_opt(2026, 1, 9).unwrap());

        let balance = derive_balance(&transactions, None, None, "BRL", period.end_date);
        assert_eq!(balance.opening_balance, Decimal::ZERO);
        assert_eq!(balance.closing_balance, dec!(60.00));

        let balance = derive_balance(&transactions, Some(dec!(1000)), None, "BRL", period.end_date);
        assert_eq!(balance.closing_balance, dec!(1060.00));

        let balance = derive_balance(&transactions, None, Some(dec!(500)), "BRL", period.end_date);
        assert_eq!(balance.opening_balance, dec!(440.00));
    }

    #[test]
    fn test_declared_balances_are_kept() {
        let transactions = vec![tx(9, dec!(100.00), TransactionType::Credit)];
        let as_of = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();

        // Declared values are not reconciled here; that is the validator's job
        let balance = derive_balance(&transactions, Some(dec!(1000)), Some(dec!(1500)), "BRL", as_of);
        assert_eq!(balance.opening_balance, dec!(1000));
        assert_eq!(balance.closing_balance, dec!(1500));
    }

    #[test]
    fn test_balance_marker_classification() {
        assert_eq!(balance_marker("SALDO ANTERIOR"), Some(BalanceMarker::Opening));
        assert_eq!(balance_marker("Saldo Anterior"), Some(BalanceMarker::Opening));
        assert_eq!(balance_marker("S A L D O"), Some(BalanceMarker::Running));
        assert_eq!(balance_marker("SALDO DO DIA"), Some(BalanceMarker::Running));
        assert_eq!(balance_marker("PIX RECEBIDO"), None);
    }
}
