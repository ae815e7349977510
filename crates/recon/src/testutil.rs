use chrono::NaiveDate;

use saldo_core::{AccountId, UserId};
use saldo_ingest::{parse_money, CanonicalRow};
use saldo_storage::{create_db_in_memory, insert_account, AccountKind, DbPool};

pub(crate) struct World {
    pub pool: DbPool,
    pub user: UserId,
    pub checking: AccountId,
    pub savings: AccountId,
    pub credit_card: AccountId,
}

/// One user with a checking, a savings and a credit-card account at the
/// same institution.
pub(crate) async fn seed_world() -> World {
    let pool = create_db_in_memory().await.unwrap();
    let user = UserId(1);
    let checking = AccountId(
        insert_account(&pool, user, "Conta Corrente", AccountKind::Checking, Some(341))
            .await
            .unwrap(),
    );
    let savings = AccountId(
        insert_account(&pool, user, "Poupança", AccountKind::Savings, Some(341))
            .await
            .unwrap(),
    );
    let credit_card = AccountId(
        insert_account(&pool, user, "Cartão Visa", AccountKind::CreditCard, Some(341))
            .await
            .unwrap(),
    );
    World { pool, user, checking, savings, credit_card }
}

/// A canonical row on day `day` of March 2025 with a locale-formatted
/// amount string.
pub(crate) fn row(day: u32, amount: &str, description: &str) -> CanonicalRow {
    CanonicalRow {
        posted_date: NaiveDate::from_ymd_opt(2025, 3, day),
        amount: parse_money(amount),
        description: description.to_string(),
        counterparty_raw: None,
        kind_raw: None,
    }
}
