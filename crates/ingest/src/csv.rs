use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canonical::{
    is_balance_line, parse_date_multi, parse_money, CanonicalRow, MIN_AMOUNT_CENTS,
};
use crate::text::TextNormalizer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvColumnMapping {
    pub date_column: Option<usize>,
    pub description_column: Option<usize>,
    pub amount_column: Option<usize>,
    pub debit_column: Option<usize>,
    pub credit_column: Option<usize>,
    pub counterparty_column: Option<usize>,
    pub kind_column: Option<usize>,
    pub date_format: String,
}

impl Default for CsvColumnMapping {
    fn default() -> Self {
        Self {
            date_column: None,
            description_column: None,
            amount_column: None,
            debit_column: None,
            credit_column: None,
            counterparty_column: None,
            kind_column: None,
            date_format: "%d/%m/%Y".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvImportProfile {
    pub name: String,
    pub mapping: CsvColumnMapping,
    pub has_header: bool,
    pub delimiter: String,
}

impl Default for CsvImportProfile {
    fn default() -> Self {
        Self {
            name: "Unnamed Profile".to_string(),
            mapping: CsvColumnMapping::default(),
            has_header: true,
            delimiter: ",".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("No data rows")]
    NoDataRows,
}

/// Parse a delimited export into canonical rows using the default repair
/// tables.
pub fn import_csv(data: &[u8], profile: &CsvImportProfile) -> Result<Vec<CanonicalRow>, CsvError> {
    import_csv_with(data, profile, &TextNormalizer::default())
}

/// Bytes go through encoding detection and mojibake repair before the CSV
/// reader ever sees them; bank exports routinely arrive in Latin-1 or
/// double-encoded UTF-8.
pub fn import_csv_with(
    data: &[u8],
    profile: &CsvImportProfile,
    normalizer: &TextNormalizer,
) -> Result<Vec<CanonicalRow>, CsvError> {
    let (text, encoding) = normalizer.decode_and_repair(data);
    tracing::debug!(encoding = %encoding, profile = %profile.name, "decoded csv import");

    let delimiter = profile.delimiter.as_bytes().first().copied().unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(profile.has_header)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mapping = &profile.mapping;
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        if record.is_empty() {
            continue;
        }

        let posted_date = match mapping.date_column {
            Some(col) => record
                .get(col)
                .and_then(|s| parse_date_multi(s, &mapping.date_format)),
            None => continue,
        };

        let description = mapping
            .description_column
            .and_then(|col| record.get(col))
            .unwrap_or_default()
            .trim()
            .to_string();

        let amount = if let Some(col) = mapping.amount_column {
            record.get(col).and_then(parse_money)
        } else if let (Some(d_col), Some(c_col)) = (mapping.debit_column, mapping.credit_column) {
            let debit = record
                .get(d_col)
                .filter(|s| !s.trim().is_empty())
                .and_then(parse_money);
            let credit = record
                .get(c_col)
                .filter(|s| !s.trim().is_empty())
                .and_then(parse_money);
            match (debit, credit) {
                // Debit column holds outflow magnitude, credit holds inflow.
                (Some(d), None) => Some(-d.abs()),
                (None, Some(c)) => Some(c.abs()),
                _ => None,
            }
        } else {
            continue;
        };

        if is_balance_line(&description) {
            continue;
        }
        if let Some(a) = amount {
            let cents = (a.abs() * Decimal::from(100)).round().to_i64().unwrap_or(0);
            if cents < MIN_AMOUNT_CENTS {
                continue;
            }
        }

        let counterparty_raw = mapping
            .counterparty_column
            .and_then(|col| record.get(col))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let kind_raw = mapping
            .kind_column
            .and_then(|col| record.get(col))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        rows.push(CanonicalRow { posted_date, amount, description, counterparty_raw, kind_raw });
    }

    if rows.is_empty() {
        return Err(CsvError::NoDataRows);
    }

    Ok(rows)
}

/// First record of the file, for mapping UIs to offer column names.
pub fn detect_headers(data: &[u8], delimiter: u8) -> Result<Vec<String>, CsvError> {
    let (text, _) = TextNormalizer::default().decode_and_repair(data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut headers = Vec::new();
    if let Some(result) = reader.records().next() {
        let record = result?;
        headers = record.iter().map(|s| s.to_string()).collect();
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn profile() -> CsvImportProfile {
        CsvImportProfile {
            name: "test".to_string(),
            has_header: true,
            delimiter: ";".to_string(),
            mapping: CsvColumnMapping {
                date_column: Some(0),
                description_column: Some(1),
                amount_column: Some(2),
                ..CsvColumnMapping::default()
            },
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn import_basic_brazilian_export() {
        let data = "Data;Hist\u{f3}rico;Valor\n10/03/2025;PIX JOAO DA SILVA;-250,00\n11/03/2025;DEPOSITO SALARIO;3.500,00\n";
        let rows = import_csv(data.as_bytes(), &profile()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].posted_date, Some(date(2025, 3, 10)));
        assert_eq!(rows[0].amount, Some(Decimal::from_str("-250.00").unwrap()));
        assert_eq!(rows[1].amount, Some(Decimal::from_str("3500.00").unwrap()));
    }

    #[test]
    fn import_latin1_bytes() {
        let data = b"Data;Hist\xf3rico;Valor\n10/03/2025;DESCRI\xc7\xc3O PADARIA;-25,00\n";
        let rows = import_csv(data, &profile()).unwrap();
        assert_eq!(rows[0].description, "DESCRIÇÃO PADARIA");
    }

    #[test]
    fn import_debit_credit_pair() {
        let data = "data;desc;debito;credito\n10/03/2025;COMPRA;50,00;\n11/03/2025;SALARIO;;1.000,00\n";
        let p = CsvImportProfile {
            mapping: CsvColumnMapping {
                date_column: Some(0),
                description_column: Some(1),
                amount_column: None,
                debit_column: Some(2),
                credit_column: Some(3),
                ..CsvColumnMapping::default()
            },
            ..profile()
        };
        let rows = import_csv(data.as_bytes(), &p).unwrap();
        assert_eq!(rows[0].amount, Some(Decimal::from_str("-50.00").unwrap()));
        assert_eq!(rows[1].amount, Some(Decimal::from_str("1000.00").unwrap()));
    }

    #[test]
    fn balance_rows_are_discarded() {
        let data = "d;h;v\n10/03/2025;SALDO ANTERIOR;1.234,56\n10/03/2025;PADARIA;-10,00\n";
        let rows = import_csv(data.as_bytes(), &profile()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "PADARIA");
    }

    #[test]
    fn sub_cent_amounts_are_discarded() {
        let data = "d;h;v\n10/03/2025;AJUSTE;0,001\n10/03/2025;PADARIA;-10,00\n";
        let rows = import_csv(data.as_bytes(), &profile()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn unparseable_fields_survive_as_none() {
        let data = "d;h;v\nxx/xx/xxxx;PADARIA;-10,00\n10/03/2025;MERCADO;abc\n";
        let rows = import_csv(data.as_bytes(), &profile()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].posted_date, None);
        assert!(rows[0].amount.is_some());
        assert_eq!(rows[1].amount, None);
        assert!(!rows[1].is_parsable());
    }

    #[test]
    fn counterparty_and_kind_columns() {
        let data = "d;h;v;quem;tipo\n10/03/2025;PIX ENVIADO;-50,00;Joao da Silva;PIX\n";
        let p = CsvImportProfile {
            mapping: CsvColumnMapping {
                counterparty_column: Some(3),
                kind_column: Some(4),
                ..profile().mapping
            },
            ..profile()
        };
        let rows = import_csv(data.as_bytes(), &p).unwrap();
        assert_eq!(rows[0].counterparty_raw.as_deref(), Some("Joao da Silva"));
        assert_eq!(rows[0].kind_raw.as_deref(), Some("PIX"));
    }

    #[test]
    fn empty_file_errors() {
        let data = "d;h;v\n";
        assert!(matches!(
            import_csv(data.as_bytes(), &profile()),
            Err(CsvError::NoDataRows)
        ));
    }

    #[test]
    fn detect_headers_returns_first_record() {
        let data = b"Data;Historico;Valor\n10/03/2025;X;-1,00\n";
        let headers = detect_headers(data, b';').unwrap();
        assert_eq!(headers, vec!["Data", "Historico", "Valor"]);
    }

    #[test]
    fn profile_serde_round_trip() {
        let p = profile();
        let json = serde_json::to_string(&p).unwrap();
        let back: CsvImportProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, p.name);
        assert_eq!(back.mapping.date_column, Some(0));
    }
}
