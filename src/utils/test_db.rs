use sqlx::PgPool;

pub async fn reset_database(pool: &PgPool) {
    sqlx::query("TRUNCATE kv_entries")
        .execute(pool)
        .await
        .expect("Failed to truncate tables for tests");
}
