use std::fmt;

use crate::re;

re!(re_installment, r"(?:\b(?:PARC(?:ELA)?)\s*)?\b\d{1,2}/\d{1,2}\s*$");

// ── Encoding detection ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Latin1,
    Windows1252,
}

impl SourceEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Latin1 => "iso-8859-1",
            SourceEncoding::Windows1252 => "windows-1252",
        }
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a byte buffer of unknown encoding. Each candidate decode is
/// scored on garbling artifacts; the cleanest one wins, ties to UTF-8
/// (candidates are tried in that order with strict improvement).
pub fn decode(bytes: &[u8]) -> (String, SourceEncoding) {
    let mut candidates = vec![
        (
            String::from_utf8_lossy(bytes).into_owned(),
            SourceEncoding::Utf8,
        ),
        (
            bytes.iter().map(|&b| b as char).collect(),
            SourceEncoding::Latin1,
        ),
        (
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
            SourceEncoding::Windows1252,
        ),
    ];

    // min_by_key keeps the first of equal minima, so a clean UTF-8 decode
    // always wins ties.
    let best = candidates
        .iter()
        .enumerate()
        .min_by_key(|(_, (text, _))| artifact_score(text))
        .map(|(i, _)| i)
        .unwrap_or(0);
    candidates.swap_remove(best)
}

/// Count garbling artifacts: replacement characters weigh 3,
/// UTF-8-read-as-Latin-1 lead bytes weigh 2, stray control characters
/// weigh 1.
fn artifact_score(text: &str) -> u32 {
    let mut score = 0u32;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{fffd}' => score += 3,
            'Ã' | 'Â' => {
                // A genuine "Ã"/"Â" is almost always followed by a space or
                // an ASCII letter; mojibake pairs it with another non-ASCII.
                if chars.peek().is_some_and(|n| !n.is_ascii()) {
                    score += 2;
                }
            }
            'â' => {
                if chars.peek() == Some(&'\u{20ac}') {
                    score += 2;
                }
            }
            '\u{0000}'..='\u{0008}'
            | '\u{000b}'
            | '\u{000c}'
            | '\u{000e}'..='\u{001f}'
            | '\u{007f}'..='\u{009f}' => score += 1,
            _ => {}
        }
    }
    score
}

// ── Mojibake repair ──────────────────────────────────────────────────────────

/// UTF-8 sequences read under a single-byte codepage, mapped back to the
/// characters they were meant to be. Longer sequences first so the
/// three-byte punctuation artifacts win over the two-byte letter pairs.
const DEFAULT_REPAIRS: &[(&str, &str)] = &[
    // Smart quotes and dashes (E2 80 xx read as cp1252)
    ("\u{e2}\u{20ac}\u{201c}", "\u{2013}"),
    ("\u{e2}\u{20ac}\u{201d}", "\u{2014}"),
    ("\u{e2}\u{20ac}\u{2122}", "\u{2019}"),
    ("\u{e2}\u{20ac}\u{2dc}", "\u{2018}"),
    ("\u{e2}\u{20ac}\u{153}", "\u{201c}"),
    ("\u{e2}\u{20ac}\u{9d}", "\u{201d}"),
    // Lowercase accented Portuguese letters (C3 xx read as cp1252/latin1)
    ("\u{c3}\u{a1}", "á"),
    ("\u{c3}\u{a0}", "à"),
    ("\u{c3}\u{a2}", "â"),
    ("\u{c3}\u{a3}", "ã"),
    ("\u{c3}\u{a9}", "é"),
    ("\u{c3}\u{aa}", "ê"),
    ("\u{c3}\u{ad}", "í"),
    ("\u{c3}\u{b3}", "ó"),
    ("\u{c3}\u{b4}", "ô"),
    ("\u{c3}\u{b5}", "õ"),
    ("\u{c3}\u{ba}", "ú"),
    ("\u{c3}\u{bc}", "ü"),
    ("\u{c3}\u{a7}", "ç"),
    // Uppercase counterparts
    ("\u{c3}\u{81}", "Á"),
    ("\u{c3}\u{80}", "À"),
    ("\u{c3}\u{201a}", "Â"),
    ("\u{c3}\u{192}", "Ã"),
    ("\u{c3}\u{2030}", "É"),
    ("\u{c3}\u{160}", "Ê"),
    ("\u{c3}\u{8d}", "Í"),
    ("\u{c3}\u{201c}", "Ó"),
    ("\u{c3}\u{201d}", "Ô"),
    ("\u{c3}\u{2022}", "Õ"),
    ("\u{c3}\u{161}", "Ú"),
    ("\u{c3}\u{2021}", "Ç"),
];

/// Header tokens that arrive with the accented letters already lost to
/// replacement characters. Repaired by name before the generic collapse.
const DEFAULT_WORD_REPAIRS: &[(&str, &str)] = &[
    ("Descri\u{fffd}\u{fffd}o", "Descrição"),
    ("DESCRI\u{fffd}\u{fffd}O", "DESCRIÇÃO"),
    ("Transa\u{fffd}\u{fffd}o", "Transação"),
    ("D\u{fffd}bito", "Débito"),
    ("D\u{fffd}BITO", "DÉBITO"),
    ("Cr\u{fffd}dito", "Crédito"),
    ("CR\u{fffd}DITO", "CRÉDITO"),
    ("Hist\u{fffd}rico", "Histórico"),
    ("HIST\u{fffd}RICO", "HISTÓRICO"),
    ("Servi\u{fffd}os", "Serviços"),
];

/// Repairs mis-decoded text. The tables are injected at construction so
/// tests can substitute alternates; `Default` carries the built-ins.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    repairs: Vec<(String, String)>,
    word_repairs: Vec<(String, String)>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        TextNormalizer {
            repairs: DEFAULT_REPAIRS
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            word_repairs: DEFAULT_WORD_REPAIRS
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        }
    }
}

impl TextNormalizer {
    pub fn new(repairs: Vec<(String, String)>, word_repairs: Vec<(String, String)>) -> Self {
        TextNormalizer { repairs, word_repairs }
    }

    /// Apply word repairs, then the sequence table, then collapse any
    /// unmapped replacement characters to a space.
    pub fn repair_mojibake(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (from, to) in &self.word_repairs {
            if out.contains(from.as_str()) {
                out = out.replace(from.as_str(), to);
            }
        }
        for (from, to) in &self.repairs {
            if out.contains(from.as_str()) {
                out = out.replace(from.as_str(), to);
            }
        }
        if out.contains('\u{fffd}') {
            out = out.replace('\u{fffd}', " ");
        }
        out
    }

    /// decode + repair in one step, preserving which encoding was used.
    pub fn decode_and_repair(&self, bytes: &[u8]) -> (String, SourceEncoding) {
        let (text, enc) = decode(bytes);
        (self.repair_mojibake(&text), enc)
    }
}

// ── Normalization ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    pub uppercase: bool,
    pub strip_accents: bool,
    pub remove_noise: bool,
}

/// Leading boilerplate some processors stamp onto every description.
const NOISE_PREFIXES: &[&str] = &[
    "NO ESTABELECIMENTO:",
    "NO ESTABELECIMENTO",
    "COMPRA NO DEBITO -",
    "COMPRA NO DEBITO",
    "COMPRA COM CARTAO -",
    "COMPRA COM CARTAO",
    "PGTO ",
];

/// Trailing location tokens dropped by noise removal.
const LOCATION_TOKENS: &[&str] = &[
    "BR", "BRA", "BRASIL", "SP", "RJ", "MG", "RS", "PR", "SC", "BA", "DF", "SAO", "PAULO", "RIO",
    "JANEIRO", "BELO", "HORIZONTE", "CURITIBA", "SALVADOR", "BRASILIA",
];

/// Payment-method and transfer-protocol jargon that carries no merchant
/// identity, plus corporate suffixes.
const STOP_WORDS: &[&str] = &[
    "PIX", "TED", "DOC", "TEV", "TRANSF", "TRANSFERENCIA", "PAGAMENTO", "PGTO", "COMPRA",
    "DEBITO", "CREDITO", "CARTAO", "SAQUE", "DEPOSITO", "BOLETO", "VISA", "MASTERCARD", "ELO",
    "LTDA", "EIRELI", "ME", "SA", "BR", "BRA", "BRASIL", "SAO", "PAULO", "RIO", "JANEIRO",
];

/// Sentinel returned when no merchant token survives filtering.
pub const EMPTY_MERCHANT_KEY: &str = "transacao";

/// Collapse separators and optionally strip noise, fold accents and
/// uppercase. The matching-key variant enables all three.
pub fn normalize(text: &str, opts: NormalizeOptions) -> String {
    let mut s: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if opts.strip_accents {
        s = s.chars().map(fold_accent).collect();
    }
    if opts.uppercase {
        s = s.to_uppercase();
    }
    if opts.remove_noise {
        s = strip_noise(&s);
    }
    s
}

/// The canonical matching key: uppercase, accent-stripped, noise-removed.
pub fn match_key(text: &str) -> String {
    normalize(
        text,
        NormalizeOptions { uppercase: true, strip_accents: true, remove_noise: true },
    )
}

/// Token key used for merchant overlap checks: match-key normalize, strip
/// a trailing installment marker, drop digit/short/stop-word tokens, keep
/// the first 6 survivors lowercase.
pub fn merchant_key(text: &str) -> String {
    let key = match_key(text);
    let key = re_installment().replace(&key, "");

    let tokens: Vec<String> = key
        .split_whitespace()
        .filter(|t| t.len() > 1)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOP_WORDS.contains(t))
        .take(6)
        .map(|t| t.to_lowercase())
        .collect();

    if tokens.is_empty() {
        EMPTY_MERCHANT_KEY.to_string()
    } else {
        tokens.join(" ")
    }
}

fn strip_noise(s: &str) -> String {
    let mut rest = s.trim();
    let upper = rest.to_uppercase();
    for prefix in NOISE_PREFIXES {
        if upper.starts_with(prefix) && rest.is_char_boundary(prefix.len()) {
            rest = &rest[prefix.len()..];
            break;
        }
    }
    let trimmed = rest.trim();

    // Drop trailing location tokens (accent handling happened upstream).
    let mut tokens: Vec<&str> = trimmed.split_whitespace().collect();
    while let Some(last) = tokens.last() {
        if tokens.len() > 1 && LOCATION_TOKENS.contains(&last.to_uppercase().as_str()) {
            tokens.pop();
        } else {
            break;
        }
    }
    tokens.join(" ")
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}
