//! Operator (human agent) CRUD operations.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Operator, OperatorLoad};
use crate::validation::{validate_display_name, validate_username, validate_weight, ValidationError};

/// Partial update of an operator record. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperatorUpdate {
    pub display_name: Option<String>,
    pub weight: Option<i64>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

/// Hash a credential as `sha256$<salt>$<hex digest>`.
pub fn hash_credential(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("sha256${}${}", salt, digest(&salt, password))
}

/// Check a password against a stored credential hash.
pub fn verify_credential(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("sha256"), Some(salt), Some(expected)) => digest(salt, password) == expected,
        _ => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a new operator.
pub async fn create_operator(
    pool: &SqlitePool,
    username: &str,
    display_name: &str,
    password: &str,
    weight: i64,
) -> Result<Operator> {
    validate_username(username)?;
    validate_display_name(display_name)?;
    validate_weight(weight)?;
    if password.is_empty() {
        return Err(ValidationError::Empty("password".to_string()).into());
    }

    let operator = sqlx::query_as::<_, Operator>(
        r#"
        INSERT INTO operators (username, display_name, credential_hash, weight)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(username)
    .bind(display_name.trim())
    .bind(hash_credential(password))
    .bind(weight)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Operator",
                    id: username.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    tracing::info!(operator_id = operator.id, username, weight, "Operator created");
    Ok(operator)
}

/// Get an operator by ID.
pub async fn get_operator(pool: &SqlitePool, id: i64) -> Result<Operator> {
    sqlx::query_as::<_, Operator>(
        r#"
        SELECT * FROM operators
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Operator", id))
}

/// Get an operator by username.
pub async fn get_operator_by_username(pool: &SqlitePool, username: &str) -> Result<Operator> {
    sqlx::query_as::<_, Operator>(
        r#"
        SELECT * FROM operators
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Operator", username))
}

/// List all operators in creation order.
pub async fn list_operators(pool: &SqlitePool) -> Result<Vec<Operator>> {
    let operators = sqlx::query_as::<_, Operator>(
        r#"
        SELECT * FROM operators
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(operators)
}

/// Apply a partial update to an operator.
pub async fn update_operator(
    pool: &SqlitePool,
    id: i64,
    update: &OperatorUpdate,
) -> Result<Operator> {
    if let Some(ref name) = update.display_name {
        validate_display_name(name)?;
    }
    if let Some(weight) = update.weight {
        validate_weight(weight)?;
    }
    let credential_hash = match update.password.as_deref() {
        Some("") => return Err(ValidationError::Empty("password".to_string()).into()),
        Some(password) => Some(hash_credential(password)),
        None => None,
    };

    let operator = sqlx::query_as::<_, Operator>(
        r#"
        UPDATE operators
        SET display_name = COALESCE(?, display_name),
            weight = COALESCE(?, weight),
            active = COALESCE(?, active),
            credential_hash = COALESCE(?, credential_hash)
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(update.display_name.as_deref().map(str::trim))
    .bind(update.weight)
    .bind(update.active)
    .bind(credential_hash)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Operator", id))?;

    tracing::info!(operator_id = id, "Operator updated");
    Ok(operator)
}

/// Delete an operator. Assigned conversations become unassigned.
pub async fn delete_operator(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM operators
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Operator", id));
    }

    tracing::info!(operator_id = id, "Operator deleted");
    Ok(())
}

/// Current assignment counts of all active operators, in creation order.
///
/// Derived from a fresh count over all conversations on every call.
pub async fn active_operator_loads(pool: &SqlitePool) -> Result<Vec<OperatorLoad>> {
    let rows = sqlx::query_as::<_, OperatorLoad>(
        r#"
        SELECT o.id AS operator_id, o.weight AS weight, COUNT(c.id) AS assigned
        FROM operators o
        LEFT JOIN conversations c ON c.assigned_operator_id = o.id
        WHERE o.active = 1
        GROUP BY o.id, o.weight
        ORDER BY o.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
