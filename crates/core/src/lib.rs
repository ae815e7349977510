pub mod batch;
pub mod entry;
pub mod fingerprint;
pub mod period;
pub mod suggestion;

pub use batch::SourceType;
pub use entry::{
    AccountId, CategoryId, Direction, EntryAccount, EntryError, EntryId, EntryType, NewEntry,
    UserId, ValidatedEntry,
};
pub use fingerprint::{amount_to_cents, file_hash, fingerprint, FingerprintError, FingerprintInput};
pub use period::DateRange;
pub use suggestion::SuggestionStatus;
