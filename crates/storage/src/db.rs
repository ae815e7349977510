use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    configure(&pool).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

/// In-memory database for tests. The single-connection pool keeps the
/// schema alive for the pool's lifetime.
pub async fn create_db_in_memory() -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    configure(&pool).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

async fn configure(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA cache_size = -32000")
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            institution_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            priority INTEGER NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            match_type TEXT NOT NULL,
            pattern TEXT NOT NULL,
            account_id INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
            min_amount_cents INTEGER,
            max_amount_cents INTEGER,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledger_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            posted_date TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            direction TEXT NOT NULL,
            entry_type TEXT NOT NULL,
            description_raw TEXT NOT NULL,
            description_normalized TEXT NOT NULL,
            merchant_normalized TEXT,
            account_id INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
            credit_card_account_id INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
            institution_id INTEGER,
            category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
            fingerprint TEXT NOT NULL,
            is_internal_transfer INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (user_id, fingerprint),
            CHECK ((account_id IS NULL) != (credit_card_account_id IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_user_date ON ledger_entries(user_id, posted_date)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            source_type TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            mapping TEXT,
            total_imported INTEGER NOT NULL DEFAULT 0,
            total_skipped INTEGER NOT NULL DEFAULT 0,
            imported_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transfer_suggestions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            out_entry_id INTEGER NOT NULL REFERENCES ledger_entries(id) ON DELETE CASCADE,
            in_entry_id INTEGER NOT NULL REFERENCES ledger_entries(id) ON DELETE CASCADE,
            score REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (user_id, out_entry_id, in_entry_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_suggestions_user_status ON transfer_suggestions(user_id, status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cc_payment_links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            payment_entry_id INTEGER NOT NULL UNIQUE REFERENCES ledger_entries(id) ON DELETE CASCADE,
            credit_card_account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            confirmed_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = create_db_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn create_db_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("ledger.db")).await.unwrap();
        let n: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n.0, 0);
    }

    #[tokio::test]
    async fn amount_check_constraint_rejects_non_positive() {
        let pool = create_db_in_memory().await.unwrap();
        sqlx::query("INSERT INTO accounts (user_id, name, kind) VALUES (1, 'Conta', 'checking')")
            .execute(&pool)
            .await
            .unwrap();
        let result = sqlx::query(
            r#"INSERT INTO ledger_entries
               (user_id, posted_date, amount_cents, direction, entry_type,
                description_raw, description_normalized, account_id, fingerprint)
               VALUES (1, '2025-03-10', 0, 'out', 'expense', 'x', 'X', 1, 'fp')"#,
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn entry_requires_exactly_one_account_reference() {
        let pool = create_db_in_memory().await.unwrap();
        sqlx::query("INSERT INTO accounts (user_id, name, kind) VALUES (1, 'Conta', 'checking')")
            .execute(&pool)
            .await
            .unwrap();
        // Both set: rejected
        let both = sqlx::query(
            r#"INSERT INTO ledger_entries
               (user_id, posted_date, amount_cents, direction, entry_type,
                description_raw, description_normalized, account_id,
                credit_card_account_id, fingerprint)
               VALUES (1, '2025-03-10', 100, 'out', 'expense', 'x', 'X', 1, 1, 'fp1')"#,
        )
        .execute(&pool)
        .await;
        assert!(both.is_err());

        // Neither set: rejected
        let neither = sqlx::query(
            r#"INSERT INTO ledger_entries
               (user_id, posted_date, amount_cents, direction, entry_type,
                description_raw, description_normalized, fingerprint)
               VALUES (1, '2025-03-10', 100, 'out', 'expense', 'x', 'X', 'fp2')"#,
        )
        .execute(&pool)
        .await;
        assert!(neither.is_err());
    }

    #[tokio::test]
    async fn deleting_account_cascades_to_entries_and_suggestions() {
        let pool = create_db_in_memory().await.unwrap();
        for name in ["Conta A", "Conta B"] {
            sqlx::query("INSERT INTO accounts (user_id, name, kind) VALUES (1, ?, 'checking')")
                .bind(name)
                .execute(&pool)
                .await
                .unwrap();
        }
        for (acct, fp, dir) in [(1, "fp-a", "out"), (2, "fp-b", "in")] {
            sqlx::query(
                r#"INSERT INTO ledger_entries
                   (user_id, posted_date, amount_cents, direction, entry_type,
                    description_raw, description_normalized, account_id, fingerprint)
                   VALUES (1, '2025-03-10', 100, ?, 'expense', 'x', 'X', ?, ?)"#,
            )
            .bind(dir)
            .bind(acct)
            .bind(fp)
            .execute(&pool)
            .await
            .unwrap();
        }
        sqlx::query(
            "INSERT INTO transfer_suggestions (user_id, out_entry_id, in_entry_id, score) VALUES (1, 1, 2, 0.9)",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("DELETE FROM accounts WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();

        let entries: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(entries.0, 1);
        let suggestions: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transfer_suggestions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(suggestions.0, 0);
    }
}
