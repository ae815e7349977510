use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an import batch came from. `Manual` covers single-entry creation
/// routed through the same commit machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Csv,
    Ofx,
    Pdf,
    Manual,
}

impl SourceType {
    pub fn as_token(self) -> &'static str {
        match self {
            SourceType::Csv => "csv",
            SourceType::Ofx => "ofx",
            SourceType::Pdf => "pdf",
            SourceType::Manual => "manual",
        }
    }

    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "csv" => Some(SourceType::Csv),
            "ofx" => Some(SourceType::Ofx),
            "pdf" => Some(SourceType::Pdf),
            "manual" => Some(SourceType::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}
