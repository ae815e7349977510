//! The reconciliation core's library facade: batch commit with
//! at-most-once recording, transfer matching and the human review
//! workflow. Consumed by the import, review and manual-entry endpoints.

pub mod commit;
pub mod matcher;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testutil;

pub use commit::{
    commit_import, create_manual_entry, CommitError, CommitRequest, CommitSummary,
    ManualEntryInput, RowError, MAX_IMPORT_COMMIT_ROWS,
};
pub use matcher::{run_transfer_matcher, run_transfer_matcher_with, MatcherError, MatcherPolicy};
pub use workflow::{
    confirm_credit_card_payment, confirm_transfer, get_reconciliation_inbox,
    reject_transfer_suggestion, Inbox, LegView, SuggestionRef, SuggestionView, WorkflowError,
};
