//! Learned rules: operator-curated guidance for automated replies.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::LearnedRule;
use crate::validation::validate_rule;

/// Store a new rule.
pub async fn create_rule(
    pool: &SqlitePool,
    rule: &str,
    active: bool,
    source_conversation_id: Option<i64>,
) -> Result<LearnedRule> {
    validate_rule(rule)?;

    let record = sqlx::query_as::<_, LearnedRule>(
        r#"
        INSERT INTO learned_rules (rule, active, source_conversation_id)
        VALUES (?, ?, ?)
        RETURNING id, rule, active, source_conversation_id, created_at
        "#,
    )
    .bind(rule.trim())
    .bind(active)
    .bind(source_conversation_id)
    .fetch_one(pool)
    .await?;

    Ok(record)
}

/// List all rules, oldest first.
pub async fn list_rules(pool: &SqlitePool) -> Result<Vec<LearnedRule>> {
    let rows = sqlx::query_as::<_, LearnedRule>(
        r#"
        SELECT id, rule, active, source_conversation_id, created_at
        FROM learned_rules
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// List the rule texts currently applied to replies.
pub async fn list_active_rules(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query_scalar::<_, String>(
        r#"
        SELECT rule
        FROM learned_rules
        WHERE active = 1
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Activate or deactivate a rule.
pub async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE learned_rules
        SET active = ?
        WHERE id = ?
        "#,
    )
    .bind(active)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("LearnedRule", id));
    }

    Ok(())
}

/// Delete a rule.
pub async fn delete_rule(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM learned_rules
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("LearnedRule", id));
    }

    Ok(())
}
