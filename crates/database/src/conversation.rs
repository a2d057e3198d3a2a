//! Conversation store: one row per external contact.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Conversation, OrderStatus};

/// Default page size for conversation listings.
pub const DEFAULT_LIST_LIMIT: i64 = 200;

/// Boolean state flags an operator (or automation) can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationFlag {
    /// Keep the conversation at the top of list views.
    Pinned,
    /// Per-conversation opt-out of automated replies.
    AutomationDisabled,
    /// Automation could not reply; a human must look.
    NeedsHumanAttention,
    /// Marked for a phone follow-up.
    ShouldCall,
}

impl ConversationFlag {
    /// Get the database column name for this flag.
    pub fn column_name(&self) -> &'static str {
        match self {
            ConversationFlag::Pinned => "pinned",
            ConversationFlag::AutomationDisabled => "automation_disabled",
            ConversationFlag::NeedsHumanAttention => "needs_human_attention",
            ConversationFlag::ShouldCall => "should_call",
        }
    }
}

/// Filters for listing conversations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationFilter {
    /// Only conversations assigned to this operator.
    pub operator_id: Option<i64>,
    /// Only conversations with this needs-human-attention value.
    pub needs_attention: Option<bool>,
    /// Maximum rows returned.
    pub limit: Option<i64>,
}

/// Resolve or create the conversation for an external contact.
///
/// The insert and the uniqueness check are a single statement, so a racing
/// creator for the same contact falls back to reading the winner's row.
/// A differing, non-empty `display_name` replaces the stored one.
///
/// Returns the conversation and whether this call created it.
pub async fn upsert_conversation(
    pool: &SqlitePool,
    wa_id: &str,
    display_name: Option<&str>,
) -> Result<(Conversation, bool)> {
    let display_name = display_name.map(str::trim).filter(|n| !n.is_empty());

    let inserted = sqlx::query_as::<_, Conversation>(
        r#"
        INSERT INTO conversations (wa_id, display_name)
        VALUES (?, ?)
        ON CONFLICT(wa_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(wa_id)
    .bind(display_name)
    .fetch_optional(pool)
    .await?;

    if let Some(conversation) = inserted {
        tracing::debug!(conversation_id = conversation.id, wa_id, "Created conversation");
        return Ok((conversation, true));
    }

    let mut existing = get_conversation_by_wa_id(pool, wa_id)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Conversation", wa_id))?;

    if let Some(name) = display_name {
        if existing.display_name.as_deref() != Some(name) {
            sqlx::query(
                r#"
                UPDATE conversations
                SET display_name = ?, updated_at = datetime('now')
                WHERE id = ?
                "#,
            )
            .bind(name)
            .bind(existing.id)
            .execute(pool)
            .await?;
            existing.display_name = Some(name.to_string());
        }
    }

    Ok((existing, false))
}

/// Get a conversation by ID.
pub async fn get_conversation(pool: &SqlitePool, id: i64) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT * FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", id))
}

/// Get a conversation by external contact identifier.
pub async fn get_conversation_by_wa_id(
    pool: &SqlitePool,
    wa_id: &str,
) -> Result<Option<Conversation>> {
    let record = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT * FROM conversations
        WHERE wa_id = ?
        "#,
    )
    .bind(wa_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// List conversations: pinned first, then by most recent message.
pub async fn list_conversations(
    pool: &SqlitePool,
    filter: &ConversationFilter,
) -> Result<Vec<Conversation>> {
    let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000);

    let rows = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT * FROM conversations
        WHERE (?1 IS NULL OR assigned_operator_id = ?1)
          AND (?2 IS NULL OR needs_human_attention = ?2)
        ORDER BY pinned DESC, COALESCE(last_message_at, 0) DESC, id DESC
        LIMIT ?3
        "#,
    )
    .bind(filter.operator_id)
    .bind(filter.needs_attention)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Refresh the cached last-message fields after a message was stored.
///
/// Only a message newer than the cached one (by id) replaces it, so stores
/// that finish out of order never move the cache backwards. Returns whether
/// the cache changed.
pub async fn record_last_message(
    pool: &SqlitePool,
    id: i64,
    message_id: i64,
    summary: &str,
    timestamp: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET last_message = ?, last_message_at = ?, last_message_id = ?,
            updated_at = datetime('now')
        WHERE id = ? AND (last_message_id IS NULL OR last_message_id < ?)
        "#,
    )
    .bind(summary)
    .bind(timestamp)
    .bind(message_id)
    .bind(id)
    .bind(message_id)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(true);
    }

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM conversations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(DatabaseError::not_found("Conversation", id));
    }

    tracing::debug!(conversation_id = id, message_id, "Last message already newer, cache kept");
    Ok(false)
}

/// Set a single boolean flag.
pub async fn set_flag(
    pool: &SqlitePool,
    id: i64,
    flag: ConversationFlag,
    value: bool,
) -> Result<()> {
    // SQLite doesn't support parameterized column names; the column comes
    // from the ConversationFlag enum, never from input.
    let query = format!(
        r#"
        UPDATE conversations
        SET {column} = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
        column = flag.column_name()
    );

    let result = sqlx::query(&query)
        .bind(value)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Conversation", id));
    }

    tracing::debug!(conversation_id = id, flag = flag.column_name(), value, "Flag updated");
    Ok(())
}

/// Set or clear the label reference.
pub async fn set_label(pool: &SqlitePool, id: i64, label_id: Option<i64>) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET label_id = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(label_id)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Conversation", id));
    }

    Ok(())
}

/// Set the order / fulfillment status.
pub async fn set_order_status(pool: &SqlitePool, id: i64, status: OrderStatus) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET order_status = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Conversation", id));
    }

    Ok(())
}

/// Assign (or unassign, with `None`) an operator.
pub async fn assign_operator(
    pool: &SqlitePool,
    id: i64,
    operator_id: Option<i64>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET assigned_operator_id = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(operator_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_foreign_key_violation() {
                return DatabaseError::NotFound {
                    entity: "Operator",
                    id: operator_id.map(|o| o.to_string()).unwrap_or_default(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Conversation", id));
    }

    Ok(())
}

/// Assign an operator only if the conversation has none yet.
///
/// Returns true if the assignment was applied.
pub async fn assign_if_unassigned(pool: &SqlitePool, id: i64, operator_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET assigned_operator_id = ?, updated_at = datetime('now')
        WHERE id = ? AND assigned_operator_id IS NULL
        "#,
    )
    .bind(operator_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Stamp the time of the latest automated follow-up.
pub async fn touch_follow_up(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET last_follow_up_at = datetime('now'), updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Conversation", id));
    }

    Ok(())
}

/// Delete a conversation and its messages.
pub async fn delete_conversation(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Conversation", id));
    }

    Ok(())
}
