use serde::{Deserialize, Serialize};
use thiserror::Error;

use saldo_core::{EntryType, SuggestionStatus, UserId};
use saldo_storage::{
    get_account, get_entry, get_pending_suggestions, get_suggestion, get_suggestion_pairs,
    insert_cc_link, insert_suggestion, link_exists_for_entry, mark_entries_transfer,
    set_entry_type, unlinked_cc_entries, update_suggestion_status,
    update_suggestion_status_by_pair, DbPool, LedgerEntry, TransferSuggestion,
};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid transfer pair: {0}")]
    InvalidPair(String),
    #[error("Invalid payment link: {0}")]
    InvalidLink(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

/// Address a suggestion either by its id or by the entry pair, for
/// callers that want to pre-reject a pairing the matcher has not proposed
/// yet.
#[derive(Debug, Clone, Copy)]
pub enum SuggestionRef {
    Id(i64),
    Pair { out_entry_id: i64, in_entry_id: i64 },
}

/// Promote both legs of a pair to internal transfers and mark any pending
/// suggestion for the pair confirmed. One transaction; no partial
/// mutation on failure.
pub async fn confirm_transfer(
    pool: &DbPool,
    user_id: UserId,
    out_entry_id: i64,
    in_entry_id: i64,
) -> Result<(), WorkflowError> {
    if out_entry_id == in_entry_id {
        return Err(WorkflowError::InvalidPair("entries must differ".to_string()));
    }
    let out = owned_entry(pool, user_id, out_entry_id).await?;
    let inn = owned_entry(pool, user_id, in_entry_id).await?;
    for entry in [&out, &inn] {
        if entry.entry_type == EntryType::Transfer {
            return Err(WorkflowError::InvalidPair(format!(
                "entry {} is already a transfer",
                entry.id
            )));
        }
    }

    let mut tx = pool.begin().await?;
    mark_entries_transfer(&mut *tx, &[out.id, inn.id]).await?;
    update_suggestion_status_by_pair(
        &mut *tx,
        user_id,
        out.id,
        inn.id,
        SuggestionStatus::Confirmed,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user = %user_id, out = out.id, r#in = inn.id, "transfer confirmed");
    Ok(())
}

/// Reject a suggestion, permanently suppressing the pair. A pair the
/// matcher never proposed is recorded as pre-rejected so future runs stay
/// suppressed.
pub async fn reject_transfer_suggestion(
    pool: &DbPool,
    user_id: UserId,
    suggestion: SuggestionRef,
) -> Result<(), WorkflowError> {
    match suggestion {
        SuggestionRef::Id(id) => {
            let s = get_suggestion(pool, id)
                .await?
                .ok_or_else(|| WorkflowError::InvalidPair("suggestion not found".to_string()))?;
            if s.user_id != user_id.0 {
                return Err(WorkflowError::InvalidPair("suggestion not yours".to_string()));
            }
            match s.status {
                SuggestionStatus::Rejected => Ok(()),
                SuggestionStatus::Confirmed => Err(WorkflowError::InvalidPair(
                    "suggestion already confirmed".to_string(),
                )),
                SuggestionStatus::Pending => {
                    update_suggestion_status(pool, id, SuggestionStatus::Rejected).await?;
                    tracing::info!(user = %user_id, suggestion = id, "suggestion rejected");
                    Ok(())
                }
            }
        }
        SuggestionRef::Pair { out_entry_id, in_entry_id } => {
            let flipped = update_suggestion_status_by_pair(
                pool,
                user_id,
                out_entry_id,
                in_entry_id,
                SuggestionStatus::Rejected,
            )
            .await?;
            if flipped > 0 {
                return Ok(());
            }

            // Nothing pending. Either the pair is already terminal, or it
            // was never proposed and the rejection must be recorded.
            let existing = get_suggestion_pairs(pool, user_id).await?;
            let found = existing.iter().find(|(o, i, _)| {
                (*o == out_entry_id && *i == in_entry_id)
                    || (*o == in_entry_id && *i == out_entry_id)
            });
            match found {
                Some((_, _, SuggestionStatus::Confirmed)) => Err(WorkflowError::InvalidPair(
                    "suggestion already confirmed".to_string(),
                )),
                Some(_) => Ok(()),
                None => {
                    owned_entry(pool, user_id, out_entry_id).await?;
                    owned_entry(pool, user_id, in_entry_id).await?;
                    insert_suggestion(
                        pool,
                        user_id,
                        out_entry_id,
                        in_entry_id,
                        0.0,
                        SuggestionStatus::Rejected,
                    )
                    .await?;
                    tracing::info!(
                        user = %user_id,
                        out = out_entry_id,
                        r#in = in_entry_id,
                        "pair pre-rejected"
                    );
                    Ok(())
                }
            }
        }
    }
}

/// Record that a bank-side outflow pays a specific credit card's bill and
/// retype the entry accordingly.
pub async fn confirm_credit_card_payment(
    pool: &DbPool,
    user_id: UserId,
    payment_entry_id: i64,
    credit_card_account_id: i64,
) -> Result<(), WorkflowError> {
    let entry = get_entry(pool, payment_entry_id)
        .await?
        .ok_or_else(|| WorkflowError::InvalidLink("payment entry not found".to_string()))?;
    if entry.user_id != user_id.0 {
        return Err(WorkflowError::InvalidLink("payment entry not yours".to_string()));
    }
    if entry.entry_type == EntryType::Transfer {
        return Err(WorkflowError::InvalidLink(
            "payment entry is already a transfer".to_string(),
        ));
    }
    if link_exists_for_entry(pool, payment_entry_id).await? {
        return Err(WorkflowError::InvalidLink("payment entry already linked".to_string()));
    }

    let account = get_account(pool, credit_card_account_id)
        .await?
        .ok_or_else(|| WorkflowError::InvalidLink("credit card account not found".to_string()))?;
    if account.user_id != user_id.0 {
        return Err(WorkflowError::InvalidLink("credit card account not yours".to_string()));
    }
    if !account.kind.is_credit() {
        return Err(WorkflowError::InvalidLink(
            "account is not a credit card".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    insert_cc_link(&mut *tx, user_id, payment_entry_id, credit_card_account_id).await?;
    set_entry_type(&mut *tx, payment_entry_id, EntryType::CcPayment).await?;
    tx.commit().await?;

    tracing::info!(
        user = %user_id,
        entry = payment_entry_id,
        account = credit_card_account_id,
        "credit card payment confirmed"
    );
    Ok(())
}

/// One leg of a suggestion, resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegView {
    pub entry_id: i64,
    pub account_id: Option<i64>,
    pub account_name: String,
    pub posted_date: chrono::NaiveDate,
    pub amount_cents: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionView {
    pub suggestion: TransferSuggestion,
    pub out_leg: LegView,
    pub in_leg: LegView,
}

/// Everything awaiting human review: pending transfer suggestions with
/// both legs resolved, plus credit-card activity with no confirmed
/// payment link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbox {
    pub suggestions: Vec<SuggestionView>,
    pub unmatched_payments: Vec<LedgerEntry>,
}

pub async fn get_reconciliation_inbox(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Inbox, WorkflowError> {
    let pending = get_pending_suggestions(pool, user_id).await?;

    let mut suggestions = Vec::with_capacity(pending.len());
    for suggestion in pending {
        let Some(out) = get_entry(pool, suggestion.out_entry_id).await? else {
            continue;
        };
        let Some(inn) = get_entry(pool, suggestion.in_entry_id).await? else {
            continue;
        };
        let out_leg = leg_view(pool, &out).await?;
        let in_leg = leg_view(pool, &inn).await?;
        suggestions.push(SuggestionView { suggestion, out_leg, in_leg });
    }

    let unmatched_payments = unlinked_cc_entries(pool, user_id).await?;
    Ok(Inbox { suggestions, unmatched_payments })
}

async fn leg_view(pool: &DbPool, entry: &LedgerEntry) -> Result<LegView, WorkflowError> {
    let account_id = entry.ledger_account_id();
    let account_name = match account_id {
        Some(id) => get_account(pool, id)
            .await?
            .map(|a| a.name)
            .unwrap_or_default(),
        None => String::new(),
    };
    Ok(LegView {
        entry_id: entry.id,
        account_id,
        account_name,
        posted_date: entry.posted_date,
        amount_cents: entry.amount_cents,
        description: entry.description_raw.clone(),
    })
}

/// Fetch an entry and verify ownership, with reason strings that
/// distinguish "not found" from "not yours".
async fn owned_entry(
    pool: &DbPool,
    user_id: UserId,
    entry_id: i64,
) -> Result<LedgerEntry, WorkflowError> {
    let entry = get_entry(pool, entry_id)
        .await?
        .ok_or_else(|| WorkflowError::InvalidPair(format!("entry {entry_id} not found")))?;
    if entry.user_id != user_id.0 {
        return Err(WorkflowError::InvalidPair(format!("entry {entry_id} not yours")));
    }
    Ok(entry)
}
