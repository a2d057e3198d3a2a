//! Automation log persistence.

use sqlx::SqlitePool;

use crate::models::AutomationLogEntry;
use crate::Result;

/// Fields of one reply attempt.
#[derive(Debug, Clone, Default)]
pub struct NewLogEntry<'a> {
    pub conversation_id: Option<i64>,
    pub inbound_text: &'a str,
    pub reply: Option<&'a str>,
    pub tokens_used: i64,
    pub success: bool,
    pub error: Option<&'a str>,
}

/// Append an automation log entry.
pub async fn insert_log(pool: &SqlitePool, entry: &NewLogEntry<'_>) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO automation_log (conversation_id, inbound_text, reply, tokens_used, success, error)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(entry.conversation_id)
    .bind(entry.inbound_text)
    .bind(entry.reply)
    .bind(entry.tokens_used)
    .bind(entry.success)
    .bind(entry.error)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Most recent log entries, newest first, optionally for one conversation.
pub async fn list_logs(
    pool: &SqlitePool,
    conversation_id: Option<i64>,
    limit: i64,
) -> Result<Vec<AutomationLogEntry>> {
    let rows = sqlx::query_as::<_, AutomationLogEntry>(
        r#"
        SELECT id, conversation_id, inbound_text, reply, tokens_used, success, error, created_at
        FROM automation_log
        WHERE (?1 IS NULL OR conversation_id = ?1)
        ORDER BY id DESC
        LIMIT ?2
        "#,
    )
    .bind(conversation_id)
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::upsert_conversation;
    use crate::Database;

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        let (conv, _) = upsert_conversation(db.pool(), "5215550300", None).await.unwrap();

        insert_log(
            db.pool(),
            &NewLogEntry {
                conversation_id: Some(conv.id),
                inbound_text: "hola",
                reply: Some("¡Hola!"),
                tokens_used: 42,
                success: true,
                error: None,
            },
        )
        .await
        .unwrap();
        insert_log(
            db.pool(),
            &NewLogEntry {
                conversation_id: Some(conv.id),
                inbound_text: "precio?",
                success: false,
                error: Some("processing timed out"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        insert_log(
            db.pool(),
            &NewLogEntry {
                inbound_text: "other",
                success: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let logs = list_logs(db.pool(), Some(conv.id), 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(!logs[0].success);
        assert_eq!(logs[0].error.as_deref(), Some("processing timed out"));
        assert_eq!(logs[1].tokens_used, 42);

        assert_eq!(list_logs(db.pool(), None, 10).await.unwrap().len(), 3);
    }
}
