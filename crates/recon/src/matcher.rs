use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use saldo_core::{DateRange, Direction, SuggestionStatus, UserId};
use saldo_ingest::{merchant_key, EMPTY_MERCHANT_KEY};
use saldo_storage::{
    get_suggestion, get_suggestion_pairs, get_unmatched_entries, insert_suggestion, DbPool,
    LedgerEntry, TransferSuggestion,
};

/// Tunable matching policy, not a hard contract. The defaults are the
/// shipped behavior; deployments may override via TOML.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherPolicy {
    /// Maximum calendar-day distance between the two legs.
    pub window_days: i64,
    /// Candidates scoring below this are discarded.
    pub min_score: f64,
    /// Added (capped at 1.0) when the legs' merchant tokens overlap.
    pub description_bonus: f64,
}

impl Default for MatcherPolicy {
    fn default() -> Self {
        MatcherPolicy { window_days: 3, min_score: 0.3, description_bonus: 0.15 }
    }
}

impl MatcherPolicy {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML: {e}"))
    }
}

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

/// Scan a user's unmatched entries for internal-transfer pairs and
/// persist reviewable suggestions with the default policy.
pub async fn run_transfer_matcher(
    pool: &DbPool,
    user_id: UserId,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<TransferSuggestion>, MatcherError> {
    run_transfer_matcher_with(pool, user_id, DateRange::new(from, to), &MatcherPolicy::default())
        .await
}

pub async fn run_transfer_matcher_with(
    pool: &DbPool,
    user_id: UserId,
    range: DateRange,
    policy: &MatcherPolicy,
) -> Result<Vec<TransferSuggestion>, MatcherError> {
    let outs = get_unmatched_entries(pool, user_id, Direction::Out, range).await?;
    let ins = get_unmatched_entries(pool, user_id, Direction::In, range).await?;

    // Every pair ever recorded, both orientations: a rejected pair must
    // never be proposed again, a confirmed one never duplicated.
    let mut seen: HashSet<(i64, i64)> = HashSet::new();
    for (out, inn, _status) in get_suggestion_pairs(pool, user_id).await? {
        seen.insert((out, inn));
        seen.insert((inn, out));
    }

    let mut created = Vec::new();
    for candidate in find_candidates(&outs, &ins, policy) {
        if seen.contains(&(candidate.out_entry_id, candidate.in_entry_id)) {
            continue;
        }
        let inserted = insert_suggestion(
            pool,
            user_id,
            candidate.out_entry_id,
            candidate.in_entry_id,
            candidate.score,
            SuggestionStatus::Pending,
        )
        .await?;
        if let Some(id) = inserted {
            if let Some(suggestion) = get_suggestion(pool, id).await? {
                created.push(suggestion);
            }
        }
    }

    tracing::info!(
        user = %user_id,
        outs = outs.len(),
        ins = ins.len(),
        created = created.len(),
        "transfer matcher run"
    );
    Ok(created)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    out_entry_id: i64,
    in_entry_id: i64,
    score: f64,
}

/// Merge two date-sorted streams with a sliding window. Transfers must
/// match to the cent and land on different accounts; the score decays
/// linearly with day distance.
fn find_candidates(
    outs: &[LedgerEntry],
    ins: &[LedgerEntry],
    policy: &MatcherPolicy,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut window_start = 0usize;

    for out in outs {
        while window_start < ins.len()
            && (out.posted_date - ins[window_start].posted_date).num_days() > policy.window_days
        {
            window_start += 1;
        }
        for inn in &ins[window_start..] {
            let day_diff = (inn.posted_date - out.posted_date).num_days();
            if day_diff > policy.window_days {
                break;
            }
            if inn.amount_cents != out.amount_cents {
                continue;
            }
            if inn.ledger_account_id() == out.ledger_account_id() {
                continue;
            }

            let mut score = (1.0 - day_diff.abs() as f64 / policy.window_days as f64).max(0.0);
            if merchant_tokens_overlap(out, inn) {
                score = (score + policy.description_bonus).min(1.0);
            }
            if score >= policy.min_score {
                candidates.push(Candidate {
                    out_entry_id: out.id,
                    in_entry_id: inn.id,
                    score,
                });
            }
        }
    }

    candidates
}

/// Token-set overlap between the legs' merchant keys. The empty-merchant
/// sentinel never counts as overlap.
fn merchant_tokens_overlap(a: &LedgerEntry, b: &LedgerEntry) -> bool {
    let tokens = |e: &LedgerEntry| -> HashSet<String> {
        e.merchant_normalized
            .clone()
            .unwrap_or_else(|| merchant_key(&e.description_normalized))
            .split_whitespace()
            .filter(|t| *t != EMPTY_MERCHANT_KEY)
            .map(str::to_string)
            .collect()
    };
    !tokens(a).is_disjoint(&tokens(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{commit_import, CommitRequest};
    use crate::testutil::{row, seed_world, World};
    use crate::workflow::{reject_transfer_suggestion, SuggestionRef};
    use saldo_core::{AccountId, SourceType};
    use saldo_ingest::CanonicalRow;

    async fn commit(
        world: &World,
        account: AccountId,
        file: &str,
        rows: Vec<CanonicalRow>,
    ) {
        commit_import(
            &world.pool,
            world.user,
            CommitRequest {
                source_type: SourceType::Csv,
                file_name: file.to_string(),
                account_id: account,
                mapping: None,
                rows,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn suggests_cent_exact_pair_across_accounts() {
        let world = seed_world().await;
        commit(&world, world.checking, "a.csv", vec![row(10, "-250,00", "TED ENVIADA")]).await;
        commit(&world, world.savings, "b.csv", vec![row(11, "250,00", "TED RECEBIDA")]).await;

        let suggestions =
            run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert_eq!(suggestions.len(), 1);
        let s = &suggestions[0];
        assert_eq!(s.status, SuggestionStatus::Pending);
        // One day apart, window 3: 1 - 1/3 ≈ 0.667 (no token overlap after
        // stop-word stripping: "ted" is jargon, "enviada"/"recebida" differ)
        assert!((s.score - 2.0 / 3.0).abs() < 1e-9, "score was {}", s.score);
    }

    #[tokio::test]
    async fn description_overlap_earns_bonus() {
        let world = seed_world().await;
        commit(&world, world.checking, "a.csv", vec![row(10, "-250,00", "RESERVA MENSAL")]).await;
        commit(&world, world.savings, "b.csv", vec![row(11, "250,00", "RESERVA MENSAL")]).await;

        let suggestions =
            run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert_eq!(suggestions.len(), 1);
        let expected = 2.0 / 3.0 + 0.15;
        assert!(
            (suggestions[0].score - expected).abs() < 1e-9,
            "score was {}",
            suggestions[0].score
        );
    }

    #[tokio::test]
    async fn unequal_cents_never_suggested() {
        let world = seed_world().await;
        commit(&world, world.checking, "a.csv", vec![row(10, "-250,00", "TRANSFERENCIA")]).await;
        commit(&world, world.savings, "b.csv", vec![row(10, "250,01", "TRANSFERENCIA")]).await;

        let suggestions =
            run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn same_account_never_suggested() {
        let world = seed_world().await;
        commit(
            &world,
            world.checking,
            "a.csv",
            vec![row(10, "-250,00", "ESTORNO A"), row(11, "250,00", "ESTORNO B")],
        )
        .await;

        let suggestions =
            run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn outside_window_never_suggested() {
        let world = seed_world().await;
        commit(&world, world.checking, "a.csv", vec![row(10, "-250,00", "TRANSFERENCIA")]).await;
        commit(&world, world.savings, "b.csv", vec![row(20, "250,00", "TRANSFERENCIA")]).await;

        let suggestions =
            run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn window_edge_scores_below_threshold() {
        // Day diff equal to the window scores 0, below min_score even
        // with the bonus withheld.
        let world = seed_world().await;
        commit(&world, world.checking, "a.csv", vec![row(10, "-250,00", "X Y")]).await;
        commit(&world, world.savings, "b.csv", vec![row(13, "250,00", "A B")]).await;

        let suggestions =
            run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn rejection_is_permanent() {
        let world = seed_world().await;
        commit(&world, world.checking, "a.csv", vec![row(10, "-250,00", "TRANSFERENCIA")]).await;
        commit(&world, world.savings, "b.csv", vec![row(11, "250,00", "TRANSFERENCIA")]).await;

        let suggestions =
            run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert_eq!(suggestions.len(), 1);

        reject_transfer_suggestion(
            &world.pool,
            world.user,
            SuggestionRef::Id(suggestions[0].id),
        )
        .await
        .unwrap();

        let again = run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert!(again.is_empty(), "rejected pair was re-proposed");
    }

    #[tokio::test]
    async fn pending_suggestion_is_not_duplicated() {
        let world = seed_world().await;
        commit(&world, world.checking, "a.csv", vec![row(10, "-250,00", "TRANSFERENCIA")]).await;
        commit(&world, world.savings, "b.csv", vec![row(11, "250,00", "TRANSFERENCIA")]).await;

        let first = run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = run_transfer_matcher(&world.pool, world.user, None, None).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn range_bounds_the_scan() {
        let world = seed_world().await;
        commit(&world, world.checking, "a.csv", vec![row(10, "-250,00", "TRANSFERENCIA")]).await;
        commit(&world, world.savings, "b.csv", vec![row(11, "250,00", "TRANSFERENCIA")]).await;

        let from = NaiveDate::from_ymd_opt(2025, 4, 1);
        let suggestions =
            run_transfer_matcher(&world.pool, world.user, from, None).await.unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn custom_policy_widens_window() {
        let world = seed_world().await;
        commit(&world, world.checking, "a.csv", vec![row(10, "-250,00", "TRANSFERENCIA")]).await;
        commit(&world, world.savings, "b.csv", vec![row(15, "250,00", "TRANSFERENCIA")]).await;

        let policy = MatcherPolicy { window_days: 10, ..MatcherPolicy::default() };
        let suggestions = run_transfer_matcher_with(
            &world.pool,
            world.user,
            DateRange::open(),
            &policy,
        )
        .await
        .unwrap();
        assert_eq!(suggestions.len(), 1);
    }

    #[test]
    fn policy_from_toml_with_defaults() {
        let policy = MatcherPolicy::from_toml("window_days = 5\n").unwrap();
        assert_eq!(policy.window_days, 5);
        assert!((policy.min_score - 0.3).abs() < f64::EPSILON);
        assert!(MatcherPolicy::from_toml("window_days = \"x\"").is_err());
    }
}
