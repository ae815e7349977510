use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::canonical::{parse_money, CanonicalRow};
use crate::text::TextNormalizer;

#[derive(Debug, Clone)]
pub struct OfxTransaction {
    pub fit_id: String,
    pub posted_date: NaiveDate,
    pub amount: Option<Decimal>,
    pub trn_type: Option<String>,
    pub memo: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OfxStatement {
    pub account_id: String,
    pub bank_id: Option<String>,
    pub account_type: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub currency: Option<String>,
    pub transactions: Vec<OfxTransaction>,
}

#[derive(Error, Debug)]
pub enum OfxError {
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Parse an OFX/SGML statement export. The format is line-oriented with
/// unclosed tags, so a streaming tag scan beats a real XML parser here.
/// Bytes run through encoding detection first; banks ship these in
/// Latin-1 as often as UTF-8.
pub fn parse_ofx(data: &[u8]) -> Result<OfxStatement, OfxError> {
    parse_ofx_with(data, &TextNormalizer::default())
}

pub fn parse_ofx_with(data: &[u8], normalizer: &TextNormalizer) -> Result<OfxStatement, OfxError> {
    let (content, encoding) = normalizer.decode_and_repair(data);
    tracing::debug!(encoding = %encoding, "decoded ofx import");

    let mut account_id = String::new();
    let mut bank_id = None;
    let mut account_type = None;
    let mut start_date = None;
    let mut end_date = None;
    let mut currency = None;
    let mut transactions = Vec::new();
    let mut current: Option<PartialTrx> = None;

    for line in content.lines() {
        let line = line.trim();
        let Some(tag) = line.strip_prefix('<') else {
            continue;
        };
        let (tag_name, value) = match tag.split_once('>') {
            Some((name, val)) => (name.trim().to_uppercase(), Some(val.trim().to_string())),
            None => (tag.trim_end_matches(['>', '\r']).to_uppercase(), None),
        };

        match tag_name.as_str() {
            "ACCTID" => {
                if let Some(v) = value {
                    account_id = v;
                }
            }
            "BANKID" => bank_id = value.or(bank_id),
            "ACCTTYPE" => account_type = value.or(account_type),
            "CURDEF" => currency = value.or(currency),
            "DTSTART" => start_date = value.as_deref().and_then(parse_ofx_date),
            "DTEND" => end_date = value.as_deref().and_then(parse_ofx_date),
            "STMTTRN" => current = Some(PartialTrx::default()),
            "/STMTTRN" => {
                if let Some(trx) = current.take() {
                    if let Some(date) = trx.date {
                        transactions.push(OfxTransaction {
                            fit_id: trx.fit_id.unwrap_or_default(),
                            posted_date: date,
                            amount: trx.amount,
                            trn_type: trx.trn_type,
                            memo: trx.memo,
                            name: trx.name,
                        });
                    }
                }
            }
            _ => {
                if let Some(trx) = current.as_mut() {
                    match tag_name.as_str() {
                        "FITID" => trx.fit_id = value.or(trx.fit_id.take()),
                        "DTPOSTED" => trx.date = value.as_deref().and_then(parse_ofx_date),
                        "TRNAMT" => trx.amount = value.as_deref().and_then(parse_money),
                        "TRNTYPE" => trx.trn_type = value.or(trx.trn_type.take()),
                        "MEMO" => trx.memo = value.or(trx.memo.take()),
                        "NAME" => trx.name = value.or(trx.name.take()),
                        _ => {}
                    }
                }
            }
        }
    }

    let start_date = start_date.ok_or(OfxError::MissingField("DTSTART".to_string()))?;
    let end_date = end_date.ok_or(OfxError::MissingField("DTEND".to_string()))?;
    if account_id.is_empty() {
        return Err(OfxError::MissingField("ACCTID".to_string()));
    }

    Ok(OfxStatement {
        account_id,
        bank_id,
        account_type,
        start_date,
        end_date,
        currency,
        transactions,
    })
}

impl OfxStatement {
    /// Shape transactions into the importer-agnostic row form: NAME and
    /// MEMO merge into the description, NAME doubles as the counterparty
    /// and TRNTYPE as the raw kind.
    pub fn to_canonical_rows(&self) -> Vec<CanonicalRow> {
        self.transactions
            .iter()
            .map(|t| {
                let description = match (t.name.as_deref(), t.memo.as_deref()) {
                    (Some(n), Some(m)) if n != m => format!("{n} - {m}"),
                    (Some(n), _) => n.to_string(),
                    (None, Some(m)) => m.to_string(),
                    (None, None) => t.fit_id.clone(),
                };
                CanonicalRow {
                    posted_date: Some(t.posted_date),
                    amount: t.amount,
                    description,
                    counterparty_raw: t.name.clone(),
                    kind_raw: t.trn_type.clone(),
                }
            })
            .collect()
    }
}

#[derive(Default)]
struct PartialTrx {
    fit_id: Option<String>,
    date: Option<NaiveDate>,
    amount: Option<Decimal>,
    trn_type: Option<String>,
    memo: Option<String>,
    name: Option<String>,
}

/// OFX dates are `YYYYMMDD` with an optional time/zone tail
/// (`20250310120000[-3:BRT]`); only the first 8 characters matter.
fn parse_ofx_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() >= 8 && s.is_char_boundary(8) {
        let y: i32 = s[0..4].parse().ok()?;
        let m: u32 = s[4..6].parse().ok()?;
        let d: u32 = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const SAMPLE_OFX: &str = r#"
OFXHEADER:100
DATA:OFXSGML
VERSION:102

<OFX>
<BANKMSGSRSV1>
<STMTTRNRS>
<STMTRS>
<CURDEF>BRL
<BANKACCTFROM>
<BANKID>0341
<ACCTID>12345-6
<ACCTTYPE>CHECKING
</BANKACCTFROM>
<BANKTRANLIST>
<DTSTART>20250301
<DTEND>20250331
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20250310
<TRNAMT>-250.00
<FITID>TXN001
<NAME>PIX JOAO DA SILVA
<MEMO>Transferencia enviada
</STMTTRN>
<STMTTRN>
<TRNTYPE>CREDIT
<DTPOSTED>20250315
<TRNAMT>3500.00
<FITID>TXN002
<NAME>SALARIO ACME LTDA
</STMTTRN>
</BANKTRANLIST>
</STMTRS>
</STMTTRNRS>
</BANKMSGSRSV1>
</OFX>
"#;

    #[test]
    fn parse_full_statement() {
        let stmt = parse_ofx(SAMPLE_OFX.as_bytes()).unwrap();
        assert_eq!(stmt.account_id, "12345-6");
        assert_eq!(stmt.bank_id.as_deref(), Some("0341"));
        assert_eq!(stmt.account_type.as_deref(), Some("CHECKING"));
        assert_eq!(stmt.currency.as_deref(), Some("BRL"));
        assert_eq!(stmt.start_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(stmt.end_date, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
        assert_eq!(stmt.transactions.len(), 2);
    }

    #[test]
    fn transaction_fields() {
        let stmt = parse_ofx(SAMPLE_OFX.as_bytes()).unwrap();
        let t0 = &stmt.transactions[0];
        assert_eq!(t0.fit_id, "TXN001");
        assert_eq!(t0.posted_date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(t0.amount, Some(Decimal::from_str("-250.00").unwrap()));
        assert_eq!(t0.trn_type.as_deref(), Some("DEBIT"));
        assert_eq!(t0.name.as_deref(), Some("PIX JOAO DA SILVA"));
    }

    #[test]
    fn canonical_rows_merge_name_and_memo() {
        let stmt = parse_ofx(SAMPLE_OFX.as_bytes()).unwrap();
        let rows = stmt.to_canonical_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "PIX JOAO DA SILVA - Transferencia enviada");
        assert_eq!(rows[0].counterparty_raw.as_deref(), Some("PIX JOAO DA SILVA"));
        assert_eq!(rows[0].kind_raw.as_deref(), Some("DEBIT"));
        assert_eq!(rows[1].description, "SALARIO ACME LTDA");
    }

    #[test]
    fn ofx_date_with_time_suffix() {
        assert_eq!(
            parse_ofx_date("20250310120000[-3:BRT]"),
            NaiveDate::from_ymd_opt(2025, 3, 10)
        );
        assert_eq!(parse_ofx_date("bogus"), None);
    }

    #[test]
    fn missing_account_id_errors() {
        let bad = r#"
<OFX>
<BANKTRANLIST>
<DTSTART>20250301
<DTEND>20250331
</BANKTRANLIST>
</OFX>
"#;
        assert!(matches!(
            parse_ofx(bad.as_bytes()),
            Err(OfxError::MissingField(f)) if f == "ACCTID"
        ));
    }

    #[test]
    fn missing_dates_error() {
        let bad = "<OFX>\n<ACCTID>123\n</OFX>\n";
        assert!(parse_ofx(bad.as_bytes()).is_err());
    }

    #[test]
    fn latin1_ofx_decodes() {
        // MEMO with ISO-8859-1 "ç" and "ã"
        let mut data = Vec::new();
        data.extend_from_slice(b"<OFX>\n<ACCTID>1\n<DTSTART>20250301\n<DTEND>20250331\n");
        data.extend_from_slice(b"<STMTTRN>\n<DTPOSTED>20250310\n<TRNAMT>-10.00\n");
        data.extend_from_slice(b"<MEMO>Transa\xe7\xe3o cart\xe3o\n</STMTTRN>\n</OFX>\n");
        let stmt = parse_ofx(&data).unwrap();
        assert_eq!(
            stmt.transactions[0].memo.as_deref(),
            Some("Transação cartão")
        );
    }
}
