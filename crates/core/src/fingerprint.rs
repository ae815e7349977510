use chrono::NaiveDate;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::batch::SourceType;
use super::entry::{Direction, EntryAccount, EntryType};

#[derive(Debug, Clone, Error)]
pub enum FingerprintError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Convert a signed decimal amount to absolute cents.
/// Fails when the value rounds to zero or below; a zero-cent entry can
/// never be a real money movement.
pub fn amount_to_cents(amount: Decimal) -> Result<i64, FingerprintError> {
    let cents = (amount.abs() * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| FingerprintError::InvalidAmount(amount.to_string()))?;
    if cents <= 0 {
        return Err(FingerprintError::InvalidAmount(amount.to_string()));
    }
    Ok(cents)
}

/// Float front door for callers holding an `f64`. NaN and infinities are
/// rejected before they can reach `Decimal`.
pub fn amount_f64_to_cents(amount: f64) -> Result<i64, FingerprintError> {
    if !amount.is_finite() {
        return Err(FingerprintError::InvalidAmount(amount.to_string()));
    }
    let dec = Decimal::from_f64(amount)
        .ok_or_else(|| FingerprintError::InvalidAmount(amount.to_string()))?;
    amount_to_cents(dec)
}

/// The ordered tuple hashed into an entry's dedup identity. Two imports of
/// the same real transaction must build identical inputs regardless of
/// which source or path produced them.
#[derive(Debug, Clone)]
pub struct FingerprintInput<'a> {
    pub posted_date: NaiveDate,
    pub amount_cents: i64,
    pub entry_type: EntryType,
    pub direction: Option<Direction>,
    pub description_normalized: &'a str,
    pub merchant_normalized: Option<&'a str>,
    pub account: EntryAccount,
    pub institution_id: Option<i64>,
}

/// SHA-256 over the `|`-joined tuple, lowercase hex. This is the sole
/// deduplication key and must stay byte-for-byte reproducible across
/// implementations.
pub fn fingerprint(input: &FingerprintInput<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.posted_date.format("%Y-%m-%d").to_string());
    hasher.update(b"|");
    hasher.update(input.amount_cents.to_string());
    hasher.update(b"|");
    hasher.update(input.entry_type.as_token());
    hasher.update(b"|");
    hasher.update(input.direction.map(Direction::as_token).unwrap_or(""));
    hasher.update(b"|");
    hasher.update(input.description_normalized);
    hasher.update(b"|");
    hasher.update(input.merchant_normalized.unwrap_or(""));
    hasher.update(b"|");
    hasher.update(input.account.id().0.to_string());
    hasher.update(b"|");
    hasher.update(
        input
            .institution_id
            .map(|i| i.to_string())
            .unwrap_or_default(),
    );
    to_hex(&hasher.finalize().into())
}

/// File-level hash used to flag (not block) re-uploads of an unchanged
/// source file: lowercase-trimmed filename + source kind + a deterministic
/// serialization of the canonical rows.
pub fn file_hash(file_name: &str, source: SourceType, rows_serialized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_name.trim().to_lowercase());
    hasher.update(b"|");
    hasher.update(source.as_token());
    hasher.update(b"|");
    hasher.update(rows_serialized);
    to_hex(&hasher.finalize().into())
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AccountId;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input() -> FingerprintInput<'static> {
        FingerprintInput {
            posted_date: date(2025, 3, 10),
            amount_cents: 25000,
            entry_type: EntryType::Expense,
            direction: Some(Direction::Out),
            description_normalized: "MERCADO BOM PRECO",
            merchant_normalized: Some("mercado bom preco"),
            account: EntryAccount::Bank(AccountId(7)),
            institution_id: Some(2),
        }
    }

    // ── amount_to_cents ───────────────────────────────────────────────────────

    #[test]
    fn amount_to_cents_rounds_and_abs() {
        assert_eq!(amount_to_cents(Decimal::from_str("250.00").unwrap()).unwrap(), 25000);
        assert_eq!(amount_to_cents(Decimal::from_str("-250.00").unwrap()).unwrap(), 25000);
        assert_eq!(amount_to_cents(Decimal::from_str("0.015").unwrap()).unwrap(), 2);
    }

    #[test]
    fn amount_to_cents_rejects_zero() {
        assert!(amount_to_cents(Decimal::ZERO).is_err());
        assert!(amount_to_cents(Decimal::from_str("0.001").unwrap()).is_err());
    }

    #[test]
    fn amount_f64_rejects_non_finite() {
        assert!(amount_f64_to_cents(f64::NAN).is_err());
        assert!(amount_f64_to_cents(f64::INFINITY).is_err());
        assert_eq!(amount_f64_to_cents(-49.99).unwrap(), 4999);
    }

    // ── fingerprint ───────────────────────────────────────────────────────────

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fingerprint(&input()), fingerprint(&input()));
        assert_eq!(fingerprint(&input()).len(), 64);
    }

    #[test]
    fn fingerprint_known_vector() {
        // Pins the wire tuple: 2025-03-10|25000|expense|out|MERCADO BOM
        // PRECO|mercado bom preco|7|2. Migrations between implementations
        // depend on this exact digest.
        let expected = {
            let mut h = Sha256::new();
            h.update("2025-03-10|25000|expense|out|MERCADO BOM PRECO|mercado bom preco|7|2");
            to_hex(&h.finalize().into())
        };
        assert_eq!(fingerprint(&input()), expected);
    }

    #[test]
    fn fingerprint_changes_with_each_field() {
        let base = fingerprint(&input());

        let mut alt = input();
        alt.posted_date = date(2025, 3, 11);
        assert_ne!(fingerprint(&alt), base);

        let mut alt = input();
        alt.amount_cents = 25001;
        assert_ne!(fingerprint(&alt), base);

        let mut alt = input();
        alt.entry_type = EntryType::Fee;
        assert_ne!(fingerprint(&alt), base);

        let mut alt = input();
        alt.direction = Some(Direction::In);
        assert_ne!(fingerprint(&alt), base);

        let mut alt = input();
        alt.description_normalized = "MERCADO BOM PRECO 2";
        assert_ne!(fingerprint(&alt), base);

        let mut alt = input();
        alt.merchant_normalized = None;
        assert_ne!(fingerprint(&alt), base);

        let mut alt = input();
        alt.account = EntryAccount::Bank(AccountId(8));
        assert_ne!(fingerprint(&alt), base);

        let mut alt = input();
        alt.institution_id = None;
        assert_ne!(fingerprint(&alt), base);
    }

    #[test]
    fn fingerprint_unset_direction_hashes_empty() {
        let mut a = input();
        a.direction = None;
        let mut b = input();
        b.direction = None;
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&input()));
    }

    // ── file_hash ─────────────────────────────────────────────────────────────

    #[test]
    fn file_hash_normalizes_filename_case_and_whitespace() {
        let rows = "2025-03-10;25000;MERCADO";
        assert_eq!(
            file_hash("Extrato.CSV", SourceType::Csv, rows),
            file_hash("  extrato.csv ", SourceType::Csv, rows)
        );
    }

    #[test]
    fn file_hash_distinguishes_kind_and_rows() {
        let rows = "2025-03-10;25000;MERCADO";
        assert_ne!(
            file_hash("extrato.csv", SourceType::Csv, rows),
            file_hash("extrato.csv", SourceType::Ofx, rows)
        );
        assert_ne!(
            file_hash("extrato.csv", SourceType::Csv, rows),
            file_hash("extrato.csv", SourceType::Csv, "2025-03-10;25001;MERCADO")
        );
    }
}
