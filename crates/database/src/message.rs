//! Message store: append-only record of every inbound and outbound message.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Message, MessageStatus, NewMessage};

/// Default page size for message listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Result of applying a delivery status to a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StatusUpdate {
    /// The status moved forward.
    Advanced {
        from: MessageStatus,
        to: MessageStatus,
    },
    /// The stored status was already at or past the incoming one.
    Unchanged { current: MessageStatus },
    /// No message carries this external id.
    NotFound,
}

/// Store a message.
///
/// Returns `None` when a message with the same external id already exists;
/// the uniqueness constraint makes this safe under concurrent delivery.
pub async fn insert_message(pool: &SqlitePool, message: &NewMessage) -> Result<Option<Message>> {
    let record = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (
            conversation_id, wa_message_id, direction, content_type, body,
            media_ref, status, automated, operator_id, timestamp, raw_payload
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(wa_message_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(message.conversation_id)
    .bind(&message.wa_message_id)
    .bind(message.direction.as_str())
    .bind(message.content_type.as_str())
    .bind(&message.body)
    .bind(&message.media_ref)
    .bind(message.status.as_str())
    .bind(message.automated)
    .bind(message.operator_id)
    .bind(message.timestamp)
    .bind(&message.raw_payload)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_foreign_key_violation() {
                return DatabaseError::not_found("Conversation", message.conversation_id);
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    if record.is_none() {
        tracing::debug!(
            wa_message_id = ?message.wa_message_id,
            "Message already stored, skipping"
        );
    }

    Ok(record)
}

/// Get a message by ID.
pub async fn get_message(pool: &SqlitePool, id: i64) -> Result<Message> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Message", id))
}

/// Get a message by its external (provider) id.
pub async fn get_message_by_wa_id(pool: &SqlitePool, wa_message_id: &str) -> Result<Option<Message>> {
    let record = sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE wa_message_id = ?
        "#,
    )
    .bind(wa_message_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Page through a conversation's messages in chronological order.
///
/// Returns up to `limit` messages older than `before` (a message id), or the
/// newest ones when `before` is `None`.
pub async fn list_messages(
    pool: &SqlitePool,
    conversation_id: i64,
    before: Option<i64>,
    limit: i64,
) -> Result<Vec<Message>> {
    let mut rows = sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE conversation_id = ?1
          AND (?2 IS NULL OR id < ?2)
        ORDER BY id DESC
        LIMIT ?3
        "#,
    )
    .bind(conversation_id)
    .bind(before)
    .bind(limit.clamp(1, 500))
    .fetch_all(pool)
    .await?;

    rows.reverse();
    Ok(rows)
}

/// The `limit` messages stored immediately before message `before_id`,
/// in chronological order. The message `before_id` itself is excluded.
pub async fn recent_history(
    pool: &SqlitePool,
    conversation_id: i64,
    before_id: Option<i64>,
    limit: i64,
) -> Result<Vec<Message>> {
    if limit <= 0 {
        return Ok(Vec::new());
    }
    let mut rows = sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE conversation_id = ?1
          AND (?2 IS NULL OR id < ?2)
        ORDER BY id DESC
        LIMIT ?3
        "#,
    )
    .bind(conversation_id)
    .bind(before_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.reverse();
    Ok(rows)
}

/// Advance a message's delivery status, never moving it backwards.
///
/// The rank comparison lives in the UPDATE itself, so concurrent receipts
/// for the same message cannot regress it.
pub async fn advance_status(
    pool: &SqlitePool,
    wa_message_id: &str,
    status: MessageStatus,
) -> Result<StatusUpdate> {
    let Some(current) = get_message_by_wa_id(pool, wa_message_id).await? else {
        return Ok(StatusUpdate::NotFound);
    };

    let result = sqlx::query(
        r#"
        UPDATE messages
        SET status = ?
        WHERE wa_message_id = ?
          AND (CASE status
                 WHEN 'received' THEN 0
                 WHEN 'sent' THEN 1
                 WHEN 'delivered' THEN 2
                 WHEN 'read' THEN 3
               END) < ?
        "#,
    )
    .bind(status.as_str())
    .bind(wa_message_id)
    .bind(status.rank())
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(StatusUpdate::Advanced {
            from: current.status,
            to: status,
        });
    }

    // Re-read: a concurrent receipt may have moved it since the first read.
    let current = get_message_by_wa_id(pool, wa_message_id)
        .await?
        .map(|m| m.status)
        .unwrap_or(current.status);

    Ok(StatusUpdate::Unchanged { current })
}

/// Count messages in a conversation.
pub async fn count_messages(pool: &SqlitePool, conversation_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM messages
        WHERE conversation_id = ?
        "#,
    )
    .bind(conversation_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::upsert_conversation;
    use crate::models::{ContentType, Direction};
    use crate::Database;

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn inbound(conversation_id: i64, wa_id: Option<&str>, text: &str) -> NewMessage {
        NewMessage {
            conversation_id,
            wa_message_id: wa_id.map(str::to_string),
            direction: Direction::In,
            content_type: ContentType::Text,
            body: Some(text.to_string()),
            media_ref: None,
            status: MessageStatus::Received,
            automated: false,
            operator_id: None,
            timestamp: 1_700_000_000,
            raw_payload: Some("{}".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_external_id() {
        let db = test_db().await;
        let (conv, _) = upsert_conversation(db.pool(), "5215550100", None).await.unwrap();

        let first = insert_message(db.pool(), &inbound(conv.id, Some("wamid.ABC"), "hola"))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = insert_message(db.pool(), &inbound(conv.id, Some("wamid.ABC"), "hola"))
            .await
            .unwrap();
        assert!(second.is_none());

        assert_eq!(count_messages(db.pool(), conv.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_null_external_ids_do_not_collide() {
        let db = test_db().await;
        let (conv, _) = upsert_conversation(db.pool(), "5215550101", None).await.unwrap();

        insert_message(db.pool(), &inbound(conv.id, None, "a")).await.unwrap().unwrap();
        insert_message(db.pool(), &inbound(conv.id, None, "b")).await.unwrap().unwrap();

        assert_eq!(count_messages(db.pool(), conv.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_for_missing_conversation() {
        let db = test_db().await;
        let result = insert_message(db.pool(), &inbound(404, Some("wamid.X"), "hi")).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_history_excludes_trigger_and_is_chronological() {
        let db = test_db().await;
        let (conv, _) = upsert_conversation(db.pool(), "5215550102", None).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            let msg = insert_message(
                db.pool(),
                &inbound(conv.id, Some(&format!("wamid.{}", i)), &format!("m{}", i)),
            )
            .await
            .unwrap()
            .unwrap();
            ids.push(msg.id);
        }

        let history = recent_history(db.pool(), conv.id, Some(ids[4]), 3).await.unwrap();
        let bodies: Vec<_> = history.iter().filter_map(|m| m.body.clone()).collect();
        assert_eq!(bodies, vec!["m1", "m2", "m3"]);

        assert!(recent_history(db.pool(), conv.id, Some(ids[4]), 0)
            .await
            .unwrap()
            .is_empty());

        let page = list_messages(db.pool(), conv.id, None, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[1].body.as_deref(), Some("m4"));

        let older = list_messages(db.pool(), conv.id, Some(page[0].id), 10).await.unwrap();
        assert_eq!(older.len(), 3);
    }

    #[tokio::test]
    async fn test_status_never_regresses() {
        let db = test_db().await;
        let (conv, _) = upsert_conversation(db.pool(), "5215550103", None).await.unwrap();
        let mut out = inbound(conv.id, Some("wamid.OUT"), "reply");
        out.direction = Direction::Out;
        out.status = MessageStatus::Sent;
        insert_message(db.pool(), &out).await.unwrap().unwrap();

        let update = advance_status(db.pool(), "wamid.OUT", MessageStatus::Read)
            .await
            .unwrap();
        assert_eq!(
            update,
            StatusUpdate::Advanced {
                from: MessageStatus::Sent,
                to: MessageStatus::Read
            }
        );

        let update = advance_status(db.pool(), "wamid.OUT", MessageStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(
            update,
            StatusUpdate::Unchanged {
                current: MessageStatus::Read
            }
        );

        let update = advance_status(db.pool(), "wamid.OUT", MessageStatus::Read)
            .await
            .unwrap();
        assert_eq!(
            update,
            StatusUpdate::Unchanged {
                current: MessageStatus::Read
            }
        );

        let stored = get_message_by_wa_id(db.pool(), "wamid.OUT").await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn test_status_for_unknown_message() {
        let db = test_db().await;
        let update = advance_status(db.pool(), "wamid.MISSING", MessageStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(update, StatusUpdate::NotFound);
    }
}
