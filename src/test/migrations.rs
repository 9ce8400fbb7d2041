#[cfg(test)]
mod tests {
    use crate::migrations::{migrate_database, normalize_sql};
    use crate::schema::CURRENT_SCHEMA;
    use rocket::tokio;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Row, SqlitePool};

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database")
    }

    async fn get_table_names(pool: &SqlitePool) -> Vec<String> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name != 'sqlite_sequence' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .expect("Failed to fetch table names");

        rows.into_iter()
            .map(|row| row.get::<String, _>(0))
            .collect()
    }

    #[tokio::test]
    async fn test_migration_creates_tables() {
        let pool = create_test_pool().await;

        let changed = migrate_database(&pool, CURRENT_SCHEMA)
            .await
            .expect("Migration failed");

        assert!(changed);
        assert_eq!(get_table_names(&pool).await, vec!["attendance", "students"]);
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let pool = create_test_pool().await;

        migrate_database(&pool, CURRENT_SCHEMA)
            .await
            .expect("First migration failed");

        let changed = migrate_database(&pool, CURRENT_SCHEMA)
            .await
            .expect("Second migration failed");

        assert!(!changed, "Re-running the migration should change nothing");
    }

    #[tokio::test]
    async fn test_migration_rejects_drifted_table() {
        let pool = create_test_pool().await;

        sqlx::raw_sql("CREATE TABLE students (id INTEGER PRIMARY KEY, nickname TEXT)")
            .execute(&pool)
            .await
            .expect("Failed to create drifted table");

        let result = migrate_database(&pool, CURRENT_SCHEMA).await;

        assert!(result.is_err(), "Drifted schema should fail verification");
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let pool = create_test_pool().await;

        migrate_database(&pool, CURRENT_SCHEMA)
            .await
            .expect("Migration failed");

        let value = sqlx::query("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("Failed to read pragma")
            .get::<i64, _>(0);

        assert_eq!(value, 1);
    }

    #[test]
    fn test_normalize_sql_ignores_formatting() {
        let formatted = "CREATE TABLE t (\n    id INTEGER -- surrogate key\n)";
        let compact = "CREATE TABLE t (id INTEGER)";

        assert_eq!(normalize_sql(formatted), normalize_sql(compact));
    }

    #[test]
    fn test_normalize_sql_ignores_if_not_exists() {
        assert_eq!(
            normalize_sql("CREATE TABLE IF NOT EXISTS t (id INTEGER)"),
            normalize_sql("CREATE TABLE t (id INTEGER)")
        );
    }
}
