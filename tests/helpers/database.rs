use sqlx::SqlitePool;

use foilopt::adapters::sqlite::create_migrated_test_pool;

/// Fresh in-memory database with the schema applied.
///
/// Each call creates a completely isolated database instance.
pub async fn setup_test_db() -> SqlitePool {
    create_migrated_test_pool()
        .await
        .expect("failed to create test database")
}

/// Closes the connection pool.
pub async fn teardown_test_db(pool: SqlitePool) {
    pool.close().await;
}
