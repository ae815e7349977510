use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use saldo_core::{
    amount_to_cents, file_hash, AccountId, CategoryId, Direction, EntryAccount, EntryType,
    NewEntry, SourceType, UserId, ValidatedEntry,
};
use saldo_ingest::{
    match_key, merchant_key, serialize_rows, CanonicalRow, Categorizer, CategoryRef,
    CsvImportProfile, RowContext, RuleMatch, UserRule,
};
use saldo_storage::{
    file_hash_seen, fingerprint_exists, get_account, get_categories, get_category_rules,
    get_entry, insert_entry, insert_import_batch, DbPool, EntryInsert, LedgerEntry,
};

/// Hard cap on rows per commit call, enforced before any processing.
pub const MAX_IMPORT_COMMIT_ROWS: usize = 500;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Batch of {0} rows exceeds the commit limit of {MAX_IMPORT_COMMIT_ROWS}")]
    RowsLimitExceeded(usize),
    #[error("Account {0} not found for this user")]
    UnknownAccount(i64),
    #[error("An entry with this fingerprint already exists")]
    DuplicateEntry,
    #[error("Invalid entry: {0}")]
    InvalidRow(#[from] RowError),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

/// Why one row was skipped. Row-level failures never abort the batch.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("unparseable date")]
    InvalidDate,
    #[error("unparseable amount")]
    InvalidAmount,
    #[error(transparent)]
    Entry(#[from] saldo_core::EntryError),
}

#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub source_type: SourceType,
    pub file_name: String,
    /// The account every row in this batch posts against.
    pub account_id: AccountId,
    /// Column mapping snapshot, stored on the batch for CSV sources.
    pub mapping: Option<CsvImportProfile>,
    pub rows: Vec<CanonicalRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub total_received: usize,
    pub total_imported: usize,
    pub total_skipped: usize,
    pub duplicates: usize,
    pub invalid_rows: usize,
    /// An identical file was committed before. A flag, never a block.
    pub duplicate_file: bool,
    pub batch_id: i64,
}

/// Commit a bounded batch of canonical rows for one user. Row-level
/// failures are counted, not fatal; the insert step is atomic for the
/// whole batch; duplicate fingerprints are expected outcomes.
pub async fn commit_import(
    pool: &DbPool,
    user_id: UserId,
    request: CommitRequest,
) -> Result<CommitSummary, CommitError> {
    if request.rows.len() > MAX_IMPORT_COMMIT_ROWS {
        return Err(CommitError::RowsLimitExceeded(request.rows.len()));
    }

    let account = resolve_account(pool, user_id, request.account_id).await?;
    let categorizer = load_categorizer(pool, user_id).await?;

    let serialized = serialize_rows(&request.rows);
    let fhash = file_hash(&request.file_name, request.source_type, &serialized);
    let duplicate_file = file_hash_seen(pool, user_id, &fhash).await?;
    if duplicate_file {
        tracing::warn!(
            user = %user_id,
            file = %request.file_name,
            "identical file committed before; continuing"
        );
    }

    let mapping_json = request
        .mapping
        .as_ref()
        .and_then(|m| serde_json::to_string(m).ok());

    let mut imported = 0usize;
    let mut skipped = 0usize;
    let mut duplicates = 0usize;
    let mut invalid_rows = 0usize;

    let mut tx = pool.begin().await?;
    for row in &request.rows {
        let validated = match build_entry(user_id, &account, &categorizer, row) {
            Ok(v) => v,
            Err(reason) => {
                tracing::warn!(user = %user_id, %reason, "skipping invalid row");
                invalid_rows += 1;
                continue;
            }
        };

        // The existence probe keeps counts exact; the unique constraint
        // remains the real guard when concurrent commits race.
        if fingerprint_exists(&mut *tx, user_id, &validated.fingerprint).await? {
            skipped += 1;
            duplicates += 1;
            continue;
        }
        match insert_entry(&mut *tx, &validated).await? {
            EntryInsert::Inserted(_) => imported += 1,
            EntryInsert::Duplicate => {
                skipped += 1;
                duplicates += 1;
            }
        }
    }

    let batch_id = insert_import_batch(
        &mut *tx,
        user_id,
        request.source_type.as_token(),
        &request.file_name,
        &fhash,
        mapping_json.as_deref(),
        imported as i64,
        skipped as i64,
    )
    .await?;
    tx.commit().await?;

    let summary = CommitSummary {
        total_received: request.rows.len(),
        total_imported: imported,
        total_skipped: skipped,
        duplicates,
        invalid_rows,
        duplicate_file,
        batch_id,
    };
    tracing::info!(
        user = %user_id,
        source = %request.source_type,
        received = summary.total_received,
        imported = summary.total_imported,
        skipped = summary.total_skipped,
        invalid = summary.invalid_rows,
        "import batch committed"
    );
    Ok(summary)
}

#[derive(Debug, Clone)]
pub struct ManualEntryInput {
    pub posted_date: chrono::NaiveDate,
    /// Signed: positive inflow, negative outflow.
    pub amount: Decimal,
    pub description: String,
    pub account_id: AccountId,
    pub merchant: Option<String>,
    pub category_id: Option<CategoryId>,
}

/// The manual-entry path runs through the same normalization, fingerprint
/// and categorization machinery as imports, so a manually typed entry
/// dedupes against a later file import of the same transaction.
pub async fn create_manual_entry(
    pool: &DbPool,
    user_id: UserId,
    input: ManualEntryInput,
) -> Result<LedgerEntry, CommitError> {
    let account = resolve_account(pool, user_id, input.account_id).await?;
    let categorizer = load_categorizer(pool, user_id).await?;

    let row = CanonicalRow {
        posted_date: Some(input.posted_date),
        amount: Some(input.amount),
        description: input.description,
        counterparty_raw: input.merchant,
        kind_raw: None,
    };
    let mut validated = build_entry(user_id, &account, &categorizer, &row)?;
    if let Some(category_id) = input.category_id {
        validated.entry.category_id = Some(category_id);
        validated = ValidatedEntry::validate(validated.entry).map_err(RowError::Entry)?;
    }

    match insert_entry(pool, &validated).await? {
        EntryInsert::Inserted(id) => {
            tracing::info!(user = %user_id, entry = id, "manual entry created");
            get_entry(pool, id)
                .await?
                .ok_or(sqlx::Error::RowNotFound)
                .map_err(CommitError::Storage)
        }
        EntryInsert::Duplicate => Err(CommitError::DuplicateEntry),
    }
}

struct ResolvedAccount {
    entry_account: EntryAccount,
    institution_id: Option<i64>,
    account_id: AccountId,
}

async fn resolve_account(
    pool: &DbPool,
    user_id: UserId,
    account_id: AccountId,
) -> Result<ResolvedAccount, CommitError> {
    let record = get_account(pool, account_id.0)
        .await?
        .filter(|a| a.user_id == user_id.0)
        .ok_or(CommitError::UnknownAccount(account_id.0))?;

    let entry_account = if record.kind.is_credit() {
        EntryAccount::CreditCard(account_id)
    } else {
        EntryAccount::Bank(account_id)
    };
    Ok(ResolvedAccount {
        entry_account,
        institution_id: record.institution_id,
        account_id,
    })
}

async fn load_categorizer(pool: &DbPool, user_id: UserId) -> Result<Categorizer, CommitError> {
    let rules = get_category_rules(pool, user_id)
        .await?
        .into_iter()
        .map(|r| UserRule {
            id: r.id,
            name: r.name,
            priority: r.priority,
            enabled: r.enabled,
            match_type: r.match_type.parse().unwrap_or(RuleMatch::Contains),
            pattern: r.pattern,
            account_id: r.account_id.map(AccountId),
            min_amount_cents: r.min_amount_cents,
            max_amount_cents: r.max_amount_cents,
            category_id: CategoryId(r.category_id),
        })
        .collect();

    let categories: Vec<CategoryRef> = get_categories(pool, user_id)
        .await?
        .into_iter()
        .map(|c| CategoryRef { id: CategoryId(c.id), name: c.name })
        .collect();

    Ok(Categorizer::with_defaults(rules, &categories))
}

/// Canonical row → validated entry: resolve date and cents, infer
/// direction and type from the sign and the account kind, normalize the
/// matching keys and categorize.
fn build_entry(
    user_id: UserId,
    account: &ResolvedAccount,
    categorizer: &Categorizer,
    row: &CanonicalRow,
) -> Result<ValidatedEntry, RowError> {
    let posted_date = row.posted_date.ok_or(RowError::InvalidDate)?;
    let amount = row.amount.ok_or(RowError::InvalidAmount)?;
    let amount_cents = amount_to_cents(amount).map_err(|_| RowError::InvalidAmount)?;

    let direction = if amount.is_sign_negative() {
        Direction::Out
    } else {
        Direction::In
    };
    let entry_type = match (account.entry_account.is_credit_card(), direction) {
        (true, Direction::Out) => EntryType::CcPurchase,
        (true, Direction::In) => EntryType::CcPayment,
        (false, Direction::Out) => EntryType::Expense,
        (false, Direction::In) => EntryType::Income,
    };

    let description_normalized = match_key(&row.description);
    let merchant_source = row.counterparty_raw.as_deref().unwrap_or(&row.description);
    let merchant_normalized = Some(merchant_key(merchant_source));

    let combined = [
        Some(row.description.as_str()),
        row.counterparty_raw.as_deref(),
        row.kind_raw.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");
    let combined_key = match_key(&combined);
    let counterparty_key = row.counterparty_raw.as_deref().map(match_key);

    let categorization = categorizer.categorize(&RowContext {
        text: &combined_key,
        counterparty: counterparty_key.as_deref(),
        amount_cents,
        account_id: account.account_id,
    });

    ValidatedEntry::validate(NewEntry {
        user_id,
        posted_date,
        amount_cents,
        direction,
        entry_type,
        description_raw: row.description.clone(),
        description_normalized,
        merchant_normalized,
        account: account.entry_account,
        institution_id: account.institution_id,
        category_id: categorization.category_id,
        is_internal_transfer: false,
    })
    .map_err(RowError::Entry)
}
