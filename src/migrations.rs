use regex::Regex;
use sqlx::{Pool, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::error::AppError;

/// Applies the target schema idempotently and verifies that the live table
/// definitions match it. Runs once at process initialization, before any
/// request handling. Returns whether any table was created.
#[instrument(skip(pool, target_schema))]
pub async fn migrate_database(
    pool: &Pool<Sqlite>,
    target_schema: &str,
) -> Result<bool, AppError> {
    info!("Starting database migration");

    let tables_before = get_tables(pool).await?;

    let mut tx = pool.begin().await?;
    sqlx::raw_sql(target_schema)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to apply schema: {}", e)))?;
    tx.commit().await?;

    let tables_after = get_tables(pool).await?;

    verify_schema(&tables_after, target_schema).await?;

    let tables_created = tables_after.len() - tables_before.len();
    if tables_created > 0 {
        info!("Migration created {} table(s)", tables_created);
    } else {
        info!("No schema changes needed");
    }

    Ok(tables_created > 0)
}

/// Compares the live table definitions against a pristine database built
/// from the target schema. CREATE TABLE IF NOT EXISTS silently keeps an
/// existing table whose shape has drifted; that drift must fail startup
/// rather than surface later as a broken statement.
#[instrument(skip_all)]
async fn verify_schema(
    live_tables: &HashMap<String, String>,
    target_schema: &str,
) -> Result<(), AppError> {
    let pristine_pool = SqlitePool::connect("sqlite::memory:").await?;
    sqlx::raw_sql(target_schema)
        .execute(&pristine_pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create pristine schema: {}", e)))?;

    let target_tables = get_tables(&pristine_pool).await?;

    let mut drifted = Vec::new();
    for (name, target_sql) in &target_tables {
        match live_tables.get(name) {
            Some(live_sql) if normalize_sql(live_sql) == normalize_sql(target_sql) => {}
            Some(_) => drifted.push(name.clone()),
            None => {
                return Err(AppError::Internal(format!(
                    "Table '{}' missing after migration",
                    name
                )));
            }
        }
    }

    if !drifted.is_empty() {
        drifted.sort();
        return Err(AppError::Internal(format!(
            "Schema drift detected in tables {:?}; the database was created by an incompatible version",
            drifted
        )));
    }

    Ok(())
}

#[instrument(skip_all)]
async fn get_tables(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
) -> Result<HashMap<String, String>, AppError> {
    let rows = sqlx::query(
        "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name != 'sqlite_sequence'",
    )
    .fetch_all(executor)
    .await?;

    let mut tables = HashMap::new();
    for row in rows {
        let name: String = row.get(0);
        let sql: String = row.get(1);
        tables.insert(name, sql);
    }
    Ok(tables)
}

pub fn normalize_sql(sql: &str) -> String {
    // Remove comments
    let re = Regex::new(r"--[^\n]*\n").unwrap();
    let sql = re.replace_all(sql, "");

    // Normalize whitespace
    let re = Regex::new(r"\s+").unwrap();
    let sql = re.replace_all(&sql, " ");

    // Remove spaces around punctuation
    let re = Regex::new(r" *([(),]) *").unwrap();
    let sql = re.replace_all(&sql, "$1");

    // Remove unnecessary quotes from identifiers
    let re = Regex::new(r#""(\w+)""#).unwrap();
    let sql = re.replace_all(&sql, "$1");

    // IF NOT EXISTS is not part of the table's shape
    let sql = sql.replace("CREATE TABLE IF NOT EXISTS", "CREATE TABLE");

    sql.trim().to_string()
}
