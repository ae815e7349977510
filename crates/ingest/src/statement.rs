use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use saldo_core::Direction;

use crate::canonical::{
    is_balance_line, parse_date_multi, parse_money, sign_from_keywords, CanonicalRow,
    MIN_AMOUNT_CENTS,
};
use crate::re;
use crate::text::{SourceEncoding, TextNormalizer};

re!(re_line_date, r"^\s*(\d{2}/\d{2}/\d{4}|\d{2}/\d{2}/\d{2}|\d{4}-\d{2}-\d{2})\b");
re!(re_line_money,
    r"(?i)([+-]?\s*(?:R\$\s*)?\d{1,3}(?:[.,]\d{3})*[.,]\d{2}-?)\s*([CD])?\s*$");

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("No transaction lines recognized")]
    NoTransactions,
}

#[derive(Debug, Clone)]
pub struct StatementImport {
    pub rows: Vec<CanonicalRow>,
    pub encoding: SourceEncoding,
}

/// Parse text extracted from a scanned or PDF statement using the default
/// repair tables.
pub fn parse_statement_text(bytes: &[u8]) -> Result<StatementImport, StatementError> {
    parse_statement_text_with(bytes, &TextNormalizer::default())
}

/// Line-oriented extraction: a transaction line starts with a date and
/// ends with a money token, optionally tagged `C`/`D`. Everything between
/// is the description. Lines missing either anchor are layout noise.
pub fn parse_statement_text_with(
    bytes: &[u8],
    normalizer: &TextNormalizer,
) -> Result<StatementImport, StatementError> {
    let (text, encoding) = normalizer.decode_and_repair(bytes);
    tracing::debug!(encoding = %encoding, "decoded statement text");

    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || is_balance_line(line) {
            continue;
        }

        let Some(date_m) = re_line_date().captures(line) else {
            continue;
        };
        let date_str = date_m.get(1).map(|m| m.as_str()).unwrap_or_default();
        let Some(posted_date) = parse_date_multi(date_str, "%d/%m/%Y") else {
            continue;
        };

        let rest = &line[date_m.get(0).map(|m| m.end()).unwrap_or(0)..];
        let Some(money_m) = re_line_money().captures(rest) else {
            continue;
        };
        let token = money_m.get(1).map(|m| m.as_str()).unwrap_or_default();
        let Some(parsed) = parse_money(token) else {
            continue;
        };

        let marker = money_m
            .get(2)
            .map(|m| m.as_str().to_uppercase());
        let explicit_sign = token.trim_start().starts_with(['+', '-'])
            || token.trim_end().ends_with('-');

        let amount = match marker.as_deref() {
            Some("C") => parsed.abs(),
            Some("D") => -parsed.abs(),
            _ if explicit_sign => parsed,
            _ => match sign_from_keywords(line) {
                Some(Direction::In) => parsed.abs(),
                // Unlabeled statement lines skew heavily toward charges.
                Some(Direction::Out) | None => -parsed.abs(),
            },
        };

        let cents = (amount.abs() * Decimal::from(100)).round().to_i64().unwrap_or(0);
        if cents < MIN_AMOUNT_CENTS {
            continue;
        }

        let desc_end = money_m.get(0).map(|m| m.start()).unwrap_or(rest.len());
        let description = rest[..desc_end]
            .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '|')
            .to_string();

        rows.push(CanonicalRow {
            posted_date: Some(posted_date),
            amount: Some(amount),
            description,
            counterparty_raw: None,
            kind_raw: None,
        });
    }

    if rows.is_empty() {
        return Err(StatementError::NoTransactions);
    }
    Ok(StatementImport { rows, encoding })
}
