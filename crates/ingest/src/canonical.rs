use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use saldo_core::Direction;

use crate::re;

/// Anything rounding below one cent is a running-balance artifact or
/// parser noise, never a transaction.
pub const MIN_AMOUNT_CENTS: i64 = 1;

re!(re_balance_line,
    r"(?i)\b(SALDO\s+(ANTERIOR|FINAL|ATUAL|DISPONIVEL|DISPON\u{cd}VEL|DO\s+DIA|EM\s+\d)|TOTAL\s+DISPONIVEL|LIMITE\s+DISPONIVEL|EXTRATO\s+DE\s+CONTA)\b");

/// One parsed source line in the shape every importer converges on.
/// `None` in date or amount marks a field the source produced but this
/// parser could not resolve; such rows are counted invalid at commit
/// rather than dropped here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub posted_date: Option<NaiveDate>,
    /// Signed: positive inflow, negative outflow.
    pub amount: Option<Decimal>,
    pub description: String,
    pub counterparty_raw: Option<String>,
    pub kind_raw: Option<String>,
}

impl CanonicalRow {
    pub fn is_parsable(&self) -> bool {
        self.posted_date.is_some() && self.amount.is_some()
    }

    /// Deterministic one-line digest used by the file-level hash.
    pub fn digest_line(&self) -> String {
        let date = self
            .posted_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "?".to_string());
        let cents = self
            .amount
            .and_then(|a| (a * Decimal::from(100)).round().to_i64())
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!("{date};{cents};{}", self.description)
    }
}

/// Deterministic serialization of a whole batch, in input order.
pub fn serialize_rows(rows: &[CanonicalRow]) -> String {
    rows.iter()
        .map(CanonicalRow::digest_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse locale-formatted money text into a signed decimal.
///
/// When both separators appear, the rightmost one is the decimal mark and
/// the other is thousands. A lone separator followed by exactly three
/// digits is read as a thousands group; any other tail is decimal.
pub fn parse_money(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let (mut negative, s) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };

    let mut s = s
        .replace("R$", "")
        .replace(['$', ' ', '\u{a0}'], "");

    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_suffix('-') {
        negative = true;
        s = rest.to_string();
    }

    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');
    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(c), None) => {
            if s.len() - c - 1 == 3 && looks_like_thousands(&s[..c]) {
                s.replace(',', "")
            } else {
                s.replace(',', ".")
            }
        }
        (None, Some(d)) => {
            if s.len() - d - 1 == 3 && looks_like_thousands(&s[..d]) {
                s.replace('.', "")
            } else {
                s
            }
        }
        (None, None) => s,
    };

    let mut dec = Decimal::from_str(&normalized).ok()?;
    if negative {
        dec = -dec;
    }
    Some(dec)
}

/// A grouped integer part reads as thousands only when it is a plain
/// non-zero digit run ("1,234"); "0,001" is a decimal, not a group.
fn looks_like_thousands(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix != "0"
        && prefix.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
}

/// Resolve a direction from transaction-kind keywords when the source
/// carries no explicit sign marker.
pub fn sign_from_keywords(text: &str) -> Option<Direction> {
    const NEGATIVE: &[&str] = &[
        "DEBITO", "COMPRA", "SAIDA", "PAGAMENTO", "PGTO", "TARIFA", "SAQUE", "JUROS", "MULTA",
    ];
    const POSITIVE: &[&str] = &[
        "CREDITO", "DEPOSITO", "ENTRADA", "RECEBIMENTO", "RECEBIDO", "RENDIMENTO", "ESTORNO",
    ];

    let key = crate::text::match_key(text);
    if NEGATIVE.iter().any(|k| key.contains(k)) {
        return Some(Direction::Out);
    }
    if POSITIVE.iter().any(|k| key.contains(k)) {
        return Some(Direction::In);
    }
    None
}

/// Running-balance and summary lines that look like transactions but are
/// not.
pub fn is_balance_line(line: &str) -> bool {
    re_balance_line().is_match(line)
}

/// Try the caller's preferred format first, then the fallback ladder.
/// Day-first formats come before month-first: the sources this system
/// ingests are predominantly day-first.
pub fn parse_date_multi(s: &str, preferred: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, preferred) {
        return Some(date);
    }
    for fmt in &[
        "%d/%m/%Y", "%Y-%m-%d", "%d/%m/%y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y",
    ] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    None
}
