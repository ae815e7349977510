use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_token(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Income,
    Expense,
    Transfer,
    CcPurchase,
    CcPayment,
    Fee,
    Refund,
}

impl EntryType {
    pub fn as_token(self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
            EntryType::Transfer => "transfer",
            EntryType::CcPurchase => "cc_purchase",
            EntryType::CcPayment => "cc_payment",
            EntryType::Fee => "fee",
            EntryType::Refund => "refund",
        }
    }

    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "income" => Some(EntryType::Income),
            "expense" => Some(EntryType::Expense),
            "transfer" => Some(EntryType::Transfer),
            "cc_purchase" => Some(EntryType::CcPurchase),
            "cc_payment" => Some(EntryType::CcPayment),
            "fee" => Some(EntryType::Fee),
            "refund" => Some(EntryType::Refund),
            _ => None,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Which ledger an entry is posted against. Exactly one of the two
/// references is ever populated on a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryAccount {
    Bank(AccountId),
    CreditCard(AccountId),
}

impl EntryAccount {
    pub fn id(self) -> AccountId {
        match self {
            EntryAccount::Bank(id) | EntryAccount::CreditCard(id) => id,
        }
    }

    pub fn bank_id(self) -> Option<AccountId> {
        match self {
            EntryAccount::Bank(id) => Some(id),
            EntryAccount::CreditCard(_) => None,
        }
    }

    pub fn credit_card_id(self) -> Option<AccountId> {
        match self {
            EntryAccount::CreditCard(id) => Some(id),
            EntryAccount::Bank(_) => None,
        }
    }

    pub fn is_credit_card(self) -> bool {
        matches!(self, EntryAccount::CreditCard(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum EntryError {
    #[error("Amount must be positive, got {0} cents")]
    NonPositiveAmount(i64),
    #[error("Transfer type and internal-transfer flag disagree")]
    TransferFlagMismatch,
    #[error("Description must not be empty")]
    EmptyDescription,
}

/// An entry as assembled by the ingestion pipeline or manual-entry path,
/// before invariants are checked and the fingerprint is sealed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntry {
    pub user_id: UserId,
    pub posted_date: NaiveDate,
    pub amount_cents: i64,
    pub direction: Direction,
    pub entry_type: EntryType,
    pub description_raw: String,
    pub description_normalized: String,
    pub merchant_normalized: Option<String>,
    pub account: EntryAccount,
    pub institution_id: Option<i64>,
    pub category_id: Option<CategoryId>,
    pub is_internal_transfer: bool,
}

/// An entry that passed invariant validation and carries its dedup
/// fingerprint. Only validated entries reach storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedEntry {
    pub entry: NewEntry,
    pub fingerprint: String,
}

impl ValidatedEntry {
    pub fn validate(entry: NewEntry) -> Result<ValidatedEntry, EntryError> {
        if entry.amount_cents <= 0 {
            return Err(EntryError::NonPositiveAmount(entry.amount_cents));
        }
        if (entry.entry_type == EntryType::Transfer) != entry.is_internal_transfer {
            return Err(EntryError::TransferFlagMismatch);
        }
        if entry.description_raw.trim().is_empty() && entry.description_normalized.is_empty() {
            return Err(EntryError::EmptyDescription);
        }

        let fingerprint = super::fingerprint::fingerprint(&super::fingerprint::FingerprintInput {
            posted_date: entry.posted_date,
            amount_cents: entry.amount_cents,
            entry_type: entry.entry_type,
            direction: Some(entry.direction),
            description_normalized: &entry.description_normalized,
            merchant_normalized: entry.merchant_normalized.as_deref(),
            account: entry.account,
            institution_id: entry.institution_id,
        });

        Ok(ValidatedEntry { entry, fingerprint })
    }
}
