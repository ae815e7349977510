//! Source-side ingestion: byte decoding, canonical row shaping and
//! deterministic categorization, shared by every import path.

/// Lazily compiled, process-wide regex. Patterns are compile-time
/// constants, so the `expect` cannot fire on user input.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}
pub(crate) use re;

pub mod canonical;
pub mod csv;
pub mod ofx;
pub mod rules;
pub mod statement;
pub mod text;

pub use canonical::{parse_money, serialize_rows, CanonicalRow, MIN_AMOUNT_CENTS};
pub use self::csv::{detect_headers, import_csv, CsvColumnMapping, CsvError, CsvImportProfile};
pub use ofx::{parse_ofx, OfxError, OfxStatement, OfxTransaction};
pub use rules::{
    builtin_rules_from_toml, default_builtin_rules, BuiltinRule, Categorization, CategorySource,
    Categorizer, CategoryRef, RowContext, RuleMatch, UserRule,
};
pub use statement::{parse_statement_text, StatementError, StatementImport};
pub use text::{
    decode, match_key, merchant_key, normalize, NormalizeOptions, SourceEncoding, TextNormalizer,
    EMPTY_MERCHANT_KEY,
};
