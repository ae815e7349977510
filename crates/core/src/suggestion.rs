use serde::{Deserialize, Serialize};
use std::fmt;

/// Review state of a transfer suggestion. `Confirmed` and `Rejected` are
/// terminal: no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_token(self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Confirmed => "confirmed",
            SuggestionStatus::Rejected => "rejected",
        }
    }

    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SuggestionStatus::Pending),
            "confirmed" => Some(SuggestionStatus::Confirmed),
            "rejected" => Some(SuggestionStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }

    pub fn can_transition_to(self, next: SuggestionStatus) -> bool {
        self == SuggestionStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_transitions_to_either_terminal() {
        assert!(SuggestionStatus::Pending.can_transition_to(SuggestionStatus::Confirmed));
        assert!(SuggestionStatus::Pending.can_transition_to(SuggestionStatus::Rejected));
    }

    #[test]
    fn terminal_states_never_transition() {
        for terminal in [SuggestionStatus::Confirmed, SuggestionStatus::Rejected] {
            for next in [
                SuggestionStatus::Pending,
                SuggestionStatus::Confirmed,
                SuggestionStatus::Rejected,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn self_transition_is_not_allowed() {
        assert!(!SuggestionStatus::Pending.can_transition_to(SuggestionStatus::Pending));
    }

    #[test]
    fn tokens_round_trip() {
        for s in [
            SuggestionStatus::Pending,
            SuggestionStatus::Confirmed,
            SuggestionStatus::Rejected,
        ] {
            assert_eq!(SuggestionStatus::from_token(s.as_token()), Some(s));
        }
    }
}
