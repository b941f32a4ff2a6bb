//! SQLite schema bootstrap. Tables are created on pool construction with
//! `CREATE TABLE IF NOT EXISTS`, so opening a database is always safe.

use sqlx::SqlitePool;

/// Create every table the engine needs. Safe to call repeatedly.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaigns (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS characters (
            campaign_id TEXT PRIMARY KEY,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS npcs (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL,
            name TEXT NOT NULL,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_npcs_campaign ON npcs (campaign_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS world_states (
            campaign_id TEXT PRIMARY KEY,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaign_bibles (
            campaign_id TEXT PRIMARY KEY,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS turns (
            campaign_id TEXT NOT NULL,
            turn_number INTEGER NOT NULL,
            player_input TEXT NOT NULL,
            intent TEXT NOT NULL,
            outcome TEXT,
            narrative TEXT NOT NULL,
            latency_ms INTEGER NOT NULL,
            portrait_map TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (campaign_id, turn_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quests (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL,
            status TEXT NOT NULL,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consequences (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            expires_at_turn INTEGER,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS foreshadow_seeds (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL,
            status TEXT NOT NULL,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS override_rules (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Idempotence ledger: a combat result id lands here exactly once
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS applied_combat_results (
            campaign_id TEXT NOT NULL,
            result_id TEXT NOT NULL,
            applied_at TEXT NOT NULL,
            PRIMARY KEY (campaign_id, result_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Small per-campaign key/value state (decay bookkeeping, director trigger)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_state (
            campaign_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (campaign_id, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Vector memory (per-campaign collections)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            kind TEXT NOT NULL,
            content TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            heat REAL NOT NULL,
            decay_rate TEXT NOT NULL,
            flags TEXT NOT NULL,
            turn_number INTEGER NOT NULL,
            metadata TEXT,
            created_at TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_memories_collection ON memories (collection, fingerprint)",
    )
    .execute(pool)
    .await?;

    // Shared chunk store for the rule library (global) and profile lore
    // (partitioned by profile id)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vector_chunks (
            collection TEXT NOT NULL,
            partition_key TEXT NOT NULL DEFAULT '',
            id TEXT NOT NULL,
            category TEXT NOT NULL,
            tags TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection, partition_key, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Open an SQLite pool (creating the file when missing) with the schema
/// ensured. `sqlite::memory:` works for tests.
pub async fn open_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    use sqlx::sqlite::SqlitePoolOptions;

    // An in-memory database lives inside ONE connection; a wider pool would
    // hand out empty databases on the other connections
    let in_memory = database_url.contains(":memory:");
    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 5 })
        .idle_timeout(if in_memory { None } else { Some(std::time::Duration::from_secs(600)) })
        .max_lifetime(None)
        .connect(database_url)
        .await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_bootstrap_is_idempotent() {
        let pool = open_pool("sqlite::memory:").await.expect("opens");
        ensure_schema(&pool).await.expect("second run is a no-op");
        // A table exists and is queryable
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaigns")
            .fetch_one(&pool)
            .await
            .expect("queryable");
        assert_eq!(count.0, 0);
    }
}
