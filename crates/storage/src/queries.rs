use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::Sqlite;

use saldo_core::{DateRange, Direction, EntryType, SuggestionStatus, UserId, ValidatedEntry};

use crate::db::DbPool;

// ── Records ──────────────────────────────────────────────────────────────────

/// External collaborators own account CRUD; this core reads kinds for
/// validation and seeds them in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Checking,
    Savings,
    CreditCard,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::CreditCard => "credit_card",
        }
    }

    pub fn from_str_or_checking(s: &str) -> Self {
        match s {
            "savings" => AccountKind::Savings,
            "credit_card" => AccountKind::CreditCard,
            _ => AccountKind::Checking,
        }
    }

    pub fn is_credit(self) -> bool {
        self == AccountKind::CreditCard
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: AccountKind,
    pub institution_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

/// A user categorization rule as persisted. The ingest crate owns the
/// matching semantics; this is the storage shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRuleRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    pub match_type: String,
    pub pattern: String,
    pub account_id: Option<i64>,
    pub min_amount_cents: Option<i64>,
    pub max_amount_cents: Option<i64>,
    pub category_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub posted_date: NaiveDate,
    pub amount_cents: i64,
    pub direction: Direction,
    pub entry_type: EntryType,
    pub description_raw: String,
    pub description_normalized: String,
    pub merchant_normalized: Option<String>,
    pub account_id: Option<i64>,
    pub credit_card_account_id: Option<i64>,
    pub institution_id: Option<i64>,
    pub category_id: Option<i64>,
    pub fingerprint: String,
    pub is_internal_transfer: bool,
    pub created_at: String,
}

impl LedgerEntry {
    /// The single account this entry is posted against, whichever column
    /// holds it.
    pub fn ledger_account_id(&self) -> Option<i64> {
        self.account_id.or(self.credit_card_account_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: i64,
    pub user_id: i64,
    pub source_type: String,
    pub file_name: String,
    pub file_hash: String,
    pub mapping: Option<String>,
    pub total_imported: i64,
    pub total_skipped: i64,
    pub imported_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSuggestion {
    pub id: i64,
    pub user_id: i64,
    pub out_entry_id: i64,
    pub in_entry_id: i64,
    pub score: f64,
    pub status: SuggestionStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditCardPaymentLink {
    pub id: i64,
    pub user_id: i64,
    pub payment_entry_id: i64,
    pub credit_card_account_id: i64,
    pub confirmed_at: String,
}

/// Outcome of an entry insert. A unique-violation on
/// `(user_id, fingerprint)` is the idempotency signal, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryInsert {
    Inserted(i64),
    Duplicate,
}

// ── Accounts / categories / rules ────────────────────────────────────────────

pub async fn insert_account(
    pool: &DbPool,
    user_id: UserId,
    name: &str,
    kind: AccountKind,
    institution_id: Option<i64>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO accounts (user_id, name, kind, institution_id) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(user_id.0)
    .bind(name)
    .bind(kind.as_str())
    .bind(institution_id)
    .fetch_one(pool)
    .await
}

pub async fn get_account(
    pool: &DbPool,
    account_id: i64,
) -> Result<Option<AccountRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64, i64, String, String, Option<i64>)>(
        "SELECT id, user_id, name, kind, institution_id FROM accounts WHERE id = ?",
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| AccountRecord {
        id: r.0,
        user_id: r.1,
        name: r.2,
        kind: AccountKind::from_str_or_checking(&r.3),
        institution_id: r.4,
    }))
}

pub async fn insert_category(
    pool: &DbPool,
    user_id: UserId,
    name: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO categories (user_id, name) VALUES (?, ?) RETURNING id",
    )
    .bind(user_id.0)
    .bind(name)
    .fetch_one(pool)
    .await
}

pub async fn get_categories(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<CategoryRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, i64, String)>(
        "SELECT id, user_id, name FROM categories WHERE user_id = ? ORDER BY name",
    )
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CategoryRecord { id: r.0, user_id: r.1, name: r.2 })
        .collect())
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_category_rule(
    pool: &DbPool,
    user_id: UserId,
    name: &str,
    priority: i32,
    match_type: &str,
    pattern: &str,
    account_id: Option<i64>,
    amount_range_cents: (Option<i64>, Option<i64>),
    category_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"INSERT INTO category_rules
           (user_id, name, priority, match_type, pattern, account_id,
            min_amount_cents, max_amount_cents, category_id)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id"#,
    )
    .bind(user_id.0)
    .bind(name)
    .bind(priority)
    .bind(match_type)
    .bind(pattern)
    .bind(account_id)
    .bind(amount_range_cents.0)
    .bind(amount_range_cents.1)
    .bind(category_id)
    .fetch_one(pool)
    .await
}

pub async fn get_category_rules(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<CategoryRuleRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, i64, String, i32, i64, String, String, Option<i64>, Option<i64>, Option<i64>, i64)>(
        r#"SELECT id, user_id, name, priority, enabled, match_type, pattern,
                  account_id, min_amount_cents, max_amount_cents, category_id
           FROM category_rules WHERE user_id = ? ORDER BY priority, id"#,
    )
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CategoryRuleRecord {
            id: r.0,
            user_id: r.1,
            name: r.2,
            priority: r.3,
            enabled: r.4 != 0,
            match_type: r.5,
            pattern: r.6,
            account_id: r.7,
            min_amount_cents: r.8,
            max_amount_cents: r.9,
            category_id: r.10,
        })
        .collect())
}

// ── Ledger entries ───────────────────────────────────────────────────────────

type EntryRow = (
    i64,
    i64,
    NaiveDate,
    i64,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    String,
    i64,
    String,
);

const ENTRY_COLUMNS: &str = "id, user_id, posted_date, amount_cents, direction, entry_type, \
     description_raw, description_normalized, merchant_normalized, account_id, \
     credit_card_account_id, institution_id, category_id, fingerprint, \
     is_internal_transfer, created_at";

fn map_entry(r: EntryRow) -> LedgerEntry {
    LedgerEntry {
        id: r.0,
        user_id: r.1,
        posted_date: r.2,
        amount_cents: r.3,
        direction: Direction::from_token(&r.4).unwrap_or(Direction::Out),
        entry_type: EntryType::from_token(&r.5).unwrap_or(EntryType::Expense),
        description_raw: r.6,
        description_normalized: r.7,
        merchant_normalized: r.8,
        account_id: r.9,
        credit_card_account_id: r.10,
        institution_id: r.11,
        category_id: r.12,
        fingerprint: r.13,
        is_internal_transfer: r.14 != 0,
        created_at: r.15,
    }
}

pub async fn insert_entry<'e, E>(ex: E, validated: &ValidatedEntry) -> Result<EntryInsert, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let e = &validated.entry;
    let result = sqlx::query_scalar::<_, i64>(
        r#"INSERT INTO ledger_entries
           (user_id, posted_date, amount_cents, direction, entry_type,
            description_raw, description_normalized, merchant_normalized,
            account_id, credit_card_account_id, institution_id, category_id,
            fingerprint, is_internal_transfer)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id"#,
    )
    .bind(e.user_id.0)
    .bind(e.posted_date)
    .bind(e.amount_cents)
    .bind(e.direction.as_token())
    .bind(e.entry_type.as_token())
    .bind(&e.description_raw)
    .bind(&e.description_normalized)
    .bind(&e.merchant_normalized)
    .bind(e.account.bank_id().map(|a| a.0))
    .bind(e.account.credit_card_id().map(|a| a.0))
    .bind(e.institution_id)
    .bind(e.category_id.map(|c| c.0))
    .bind(&validated.fingerprint)
    .bind(e.is_internal_transfer)
    .fetch_one(ex)
    .await;

    match result {
        Ok(id) => Ok(EntryInsert::Inserted(id)),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(EntryInsert::Duplicate),
        Err(e) => Err(e),
    }
}

pub async fn fingerprint_exists<'e, E>(
    ex: E,
    user_id: UserId,
    fingerprint: &str,
) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM ledger_entries WHERE user_id = ? AND fingerprint = ? LIMIT 1",
    )
    .bind(user_id.0)
    .bind(fingerprint)
    .fetch_optional(ex)
    .await?;
    Ok(row.is_some())
}

pub async fn get_entry(pool: &DbPool, entry_id: i64) -> Result<Option<LedgerEntry>, sqlx::Error> {
    let row = sqlx::query_as::<_, EntryRow>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = ?"
    ))
    .bind(entry_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(map_entry))
}

pub async fn get_entries_for_user(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EntryRow>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE user_id = ? ORDER BY posted_date, id"
    ))
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(map_entry).collect())
}

pub async fn count_entries(pool: &DbPool, user_id: UserId) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ledger_entries WHERE user_id = ?")
        .bind(user_id.0)
        .fetch_one(pool)
        .await
}

/// Entries eligible for transfer matching: right direction, not already a
/// transfer, not referenced by any non-rejected suggestion, inside the
/// range. Date-sorted so the matcher can slide a window instead of
/// cross-joining.
pub async fn get_unmatched_entries(
    pool: &DbPool,
    user_id: UserId,
    direction: Direction,
    range: DateRange,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EntryRow>(&format!(
        r#"SELECT {ENTRY_COLUMNS} FROM ledger_entries e
           WHERE e.user_id = ? AND e.direction = ? AND e.entry_type != 'transfer'
             AND NOT EXISTS (
                 SELECT 1 FROM transfer_suggestions s
                 WHERE s.user_id = e.user_id AND s.status != 'rejected'
                   AND (s.out_entry_id = e.id OR s.in_entry_id = e.id)
             )
             AND (? IS NULL OR e.posted_date >= ?)
             AND (? IS NULL OR e.posted_date <= ?)
           ORDER BY e.posted_date, e.id"#
    ))
    .bind(user_id.0)
    .bind(direction.as_token())
    .bind(range.from)
    .bind(range.from)
    .bind(range.to)
    .bind(range.to)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(map_entry).collect())
}

pub async fn mark_entries_transfer<'e, E>(ex: E, entry_ids: &[i64]) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    if entry_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = entry_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!(
        "UPDATE ledger_entries SET entry_type = 'transfer', is_internal_transfer = 1, \
         updated_at = datetime('now') WHERE id IN ({placeholders})"
    );
    let mut query = sqlx::query(&sql);
    for id in entry_ids {
        query = query.bind(id);
    }
    Ok(query.execute(ex).await?.rows_affected())
}

pub async fn set_entry_type<'e, E>(
    ex: E,
    entry_id: i64,
    entry_type: EntryType,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE ledger_entries SET entry_type = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(entry_type.as_token())
    .bind(entry_id)
    .execute(ex)
    .await?;
    Ok(())
}

// ── Import batches ───────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub async fn insert_import_batch<'e, E>(
    ex: E,
    user_id: UserId,
    source_type: &str,
    file_name: &str,
    file_hash: &str,
    mapping: Option<&str>,
    total_imported: i64,
    total_skipped: i64,
) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>(
        r#"INSERT INTO import_batches
           (user_id, source_type, file_name, file_hash, mapping, total_imported, total_skipped)
           VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id"#,
    )
    .bind(user_id.0)
    .bind(source_type)
    .bind(file_name)
    .bind(file_hash)
    .bind(mapping)
    .bind(total_imported)
    .bind(total_skipped)
    .fetch_one(ex)
    .await
}

pub async fn file_hash_seen<'e, E>(
    ex: E,
    user_id: UserId,
    file_hash: &str,
) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM import_batches WHERE user_id = ? AND file_hash = ? LIMIT 1",
    )
    .bind(user_id.0)
    .bind(file_hash)
    .fetch_optional(ex)
    .await?;
    Ok(row.is_some())
}

pub async fn get_import_batches(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<ImportBatch>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, i64, String, String, String, Option<String>, i64, i64, String)>(
        r#"SELECT id, user_id, source_type, file_name, file_hash, mapping,
                  total_imported, total_skipped, imported_at
           FROM import_batches WHERE user_id = ? ORDER BY id DESC"#,
    )
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ImportBatch {
            id: r.0,
            user_id: r.1,
            source_type: r.2,
            file_name: r.3,
            file_hash: r.4,
            mapping: r.5,
            total_imported: r.6,
            total_skipped: r.7,
            imported_at: r.8,
        })
        .collect())
}

// ── Transfer suggestions ─────────────────────────────────────────────────────

type SuggestionRow = (i64, i64, i64, i64, f64, String, String);

const SUGGESTION_COLUMNS: &str =
    "id, user_id, out_entry_id, in_entry_id, score, status, created_at";

fn map_suggestion(r: SuggestionRow) -> TransferSuggestion {
    TransferSuggestion {
        id: r.0,
        user_id: r.1,
        out_entry_id: r.2,
        in_entry_id: r.3,
        score: r.4,
        status: SuggestionStatus::from_token(&r.5).unwrap_or(SuggestionStatus::Pending),
        created_at: r.6,
    }
}

/// Insert a suggestion; `None` when the pair already exists for the user
/// (the unique index is the real guard under concurrent runs).
pub async fn insert_suggestion<'e, E>(
    ex: E,
    user_id: UserId,
    out_entry_id: i64,
    in_entry_id: i64,
    score: f64,
    status: SuggestionStatus,
) -> Result<Option<i64>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>(
        r#"INSERT INTO transfer_suggestions (user_id, out_entry_id, in_entry_id, score, status)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT (user_id, out_entry_id, in_entry_id) DO NOTHING
           RETURNING id"#,
    )
    .bind(user_id.0)
    .bind(out_entry_id)
    .bind(in_entry_id)
    .bind(score)
    .bind(status.as_token())
    .fetch_optional(ex)
    .await
}

pub async fn get_suggestion(
    pool: &DbPool,
    suggestion_id: i64,
) -> Result<Option<TransferSuggestion>, sqlx::Error> {
    let row = sqlx::query_as::<_, SuggestionRow>(&format!(
        "SELECT {SUGGESTION_COLUMNS} FROM transfer_suggestions WHERE id = ?"
    ))
    .bind(suggestion_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(map_suggestion))
}

/// Every pair ever recorded for the user, any status. The matcher uses
/// this to honor rejection permanence.
pub async fn get_suggestion_pairs(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<(i64, i64, SuggestionStatus)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, i64, String)>(
        "SELECT out_entry_id, in_entry_id, status FROM transfer_suggestions WHERE user_id = ?",
    )
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| {
            (
                r.0,
                r.1,
                SuggestionStatus::from_token(&r.2).unwrap_or(SuggestionStatus::Pending),
            )
        })
        .collect())
}

pub async fn get_pending_suggestions(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<TransferSuggestion>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SuggestionRow>(&format!(
        "SELECT {SUGGESTION_COLUMNS} FROM transfer_suggestions \
         WHERE user_id = ? AND status = 'pending' ORDER BY score DESC, id"
    ))
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(map_suggestion).collect())
}

/// Flip a pending suggestion to a terminal status. Returns rows affected;
/// 0 means it did not exist or was already terminal.
pub async fn update_suggestion_status<'e, E>(
    ex: E,
    suggestion_id: i64,
    to: SuggestionStatus,
) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE transfer_suggestions SET status = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(to.as_token())
    .bind(suggestion_id)
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}

/// Same, addressed by pair in either orientation.
pub async fn update_suggestion_status_by_pair<'e, E>(
    ex: E,
    user_id: UserId,
    entry_a: i64,
    entry_b: i64,
    to: SuggestionStatus,
) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"UPDATE transfer_suggestions SET status = ?
           WHERE user_id = ? AND status = 'pending'
             AND ((out_entry_id = ? AND in_entry_id = ?)
               OR (out_entry_id = ? AND in_entry_id = ?))"#,
    )
    .bind(to.as_token())
    .bind(user_id.0)
    .bind(entry_a)
    .bind(entry_b)
    .bind(entry_b)
    .bind(entry_a)
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}

// ── Credit card payment links ────────────────────────────────────────────────

pub async fn insert_cc_link<'e, E>(
    ex: E,
    user_id: UserId,
    payment_entry_id: i64,
    credit_card_account_id: i64,
) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>(
        r#"INSERT INTO cc_payment_links (user_id, payment_entry_id, credit_card_account_id)
           VALUES (?, ?, ?) RETURNING id"#,
    )
    .bind(user_id.0)
    .bind(payment_entry_id)
    .bind(credit_card_account_id)
    .fetch_one(ex)
    .await
}

pub async fn get_cc_links(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<CreditCardPaymentLink>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, i64, i64, i64, String)>(
        r#"SELECT id, user_id, payment_entry_id, credit_card_account_id, confirmed_at
           FROM cc_payment_links WHERE user_id = ? ORDER BY id"#,
    )
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| CreditCardPaymentLink {
            id: r.0,
            user_id: r.1,
            payment_entry_id: r.2,
            credit_card_account_id: r.3,
            confirmed_at: r.4,
        })
        .collect())
}

pub async fn link_exists_for_entry(
    pool: &DbPool,
    payment_entry_id: i64,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM cc_payment_links WHERE payment_entry_id = ? LIMIT 1")
            .bind(payment_entry_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

/// Credit-card-side activity with no confirmed payment link yet: the
/// reconciliation inbox's second half.
pub async fn unlinked_cc_entries(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EntryRow>(&format!(
        r#"SELECT {ENTRY_COLUMNS} FROM ledger_entries e
           WHERE e.user_id = ? AND e.credit_card_account_id IS NOT NULL
             AND (e.entry_type = 'cc_purchase' OR e.direction = 'out')
             AND NOT EXISTS (
                 SELECT 1 FROM cc_payment_links l WHERE l.payment_entry_id = e.id
             )
           ORDER BY e.posted_date, e.id"#
    ))
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(map_entry).collect())
}
