pub mod db;
pub mod queries;

pub use db::{create_db, create_db_in_memory, DbPool};
pub use queries::{
    count_entries, file_hash_seen, fingerprint_exists, get_account, get_categories,
    get_category_rules, get_cc_links, get_entries_for_user, get_entry, get_import_batches,
    get_pending_suggestions, get_suggestion, get_suggestion_pairs, get_unmatched_entries,
    insert_account, insert_category, insert_category_rule, insert_cc_link, insert_entry,
    insert_import_batch, insert_suggestion, link_exists_for_entry, mark_entries_transfer,
    set_entry_type, unlinked_cc_entries, update_suggestion_status,
    update_suggestion_status_by_pair, AccountKind, AccountRecord, CategoryRecord,
    CategoryRuleRecord, CreditCardPaymentLink, EntryInsert, ImportBatch, LedgerEntry,
    TransferSuggestion,
};
