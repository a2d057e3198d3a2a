//! Automation settings singleton.
//!
//! The single row is seeded by the migration; reads always go to the
//! database so updates are visible to the next reply attempt.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::AutomationSettings;
use crate::validation::validate_generation_params;

/// Replacement values for the automation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub enabled: bool,
    pub instructions: String,
    pub knowledge: String,
    pub model: String,
    pub max_tokens: i64,
    pub temperature: f64,
    pub history_depth: i64,
    pub audio_replies: bool,
    pub voice: String,
    pub voice_speed: f64,
    pub learning_enabled: bool,
}

impl From<AutomationSettings> for SettingsUpdate {
    fn from(s: AutomationSettings) -> Self {
        Self {
            enabled: s.enabled,
            instructions: s.instructions,
            knowledge: s.knowledge,
            model: s.model,
            max_tokens: s.max_tokens,
            temperature: s.temperature,
            history_depth: s.history_depth,
            audio_replies: s.audio_replies,
            voice: s.voice,
            voice_speed: s.voice_speed,
            learning_enabled: s.learning_enabled,
        }
    }
}

/// Read the current automation settings.
pub async fn get_settings(pool: &SqlitePool) -> Result<AutomationSettings> {
    sqlx::query_as::<_, AutomationSettings>(
        r#"
        SELECT enabled, instructions, knowledge, model, max_tokens, temperature,
               history_depth, audio_replies, voice, voice_speed, learning_enabled,
               updated_at
        FROM automation_settings
        WHERE id = 1
        "#,
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("AutomationSettings", 1))
}

/// Replace the automation settings.
///
/// Instruction text is stored as given; its character budget applies when
/// a reply prompt is assembled.
pub async fn update_settings(
    pool: &SqlitePool,
    update: &SettingsUpdate,
) -> Result<AutomationSettings> {
    validate_generation_params(
        update.max_tokens,
        update.temperature,
        update.history_depth,
        update.voice_speed,
    )?;

    sqlx::query(
        r#"
        INSERT INTO automation_settings (
            id, enabled, instructions, knowledge, model, max_tokens, temperature,
            history_depth, audio_replies, voice, voice_speed, learning_enabled
        )
        VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            enabled = excluded.enabled,
            instructions = excluded.instructions,
            knowledge = excluded.knowledge,
            model = excluded.model,
            max_tokens = excluded.max_tokens,
            temperature = excluded.temperature,
            history_depth = excluded.history_depth,
            audio_replies = excluded.audio_replies,
            voice = excluded.voice,
            voice_speed = excluded.voice_speed,
            learning_enabled = excluded.learning_enabled,
            updated_at = datetime('now')
        "#,
    )
    .bind(update.enabled)
    .bind(&update.instructions)
    .bind(&update.knowledge)
    .bind(&update.model)
    .bind(update.max_tokens)
    .bind(update.temperature)
    .bind(update.history_depth)
    .bind(update.audio_replies)
    .bind(&update.voice)
    .bind(update.voice_speed)
    .bind(update.learning_enabled)
    .execute(pool)
    .await?;

    tracing::info!(enabled = update.enabled, model = %update.model, "Automation settings updated");
    get_settings(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_seeded_defaults() {
        let db = test_db().await;
        let settings = get_settings(db.pool()).await.unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.history_depth, 10);
        assert_eq!(settings.max_tokens, 400);
        assert!(!settings.learning_enabled);
    }

    #[tokio::test]
    async fn test_update_is_visible_immediately() {
        let db = test_db().await;
        let mut update = SettingsUpdate::from(get_settings(db.pool()).await.unwrap());
        update.enabled = true;
        update.instructions = "Eres un asistente de ventas.".to_string();
        update.history_depth = 4;

        let saved = update_settings(db.pool(), &update).await.unwrap();
        assert!(saved.enabled);
        assert_eq!(saved.history_depth, 4);

        let fresh = get_settings(db.pool()).await.unwrap();
        assert_eq!(fresh.instructions, "Eres un asistente de ventas.");
    }

    #[tokio::test]
    async fn test_long_instructions_stored_verbatim() {
        let db = test_db().await;
        let mut update = SettingsUpdate::from(get_settings(db.pool()).await.unwrap());
        update.instructions = "x".repeat(20_000);

        let saved = update_settings(db.pool(), &update).await.unwrap();
        assert_eq!(saved.instructions.len(), 20_000);
    }

    #[tokio::test]
    async fn test_invalid_params_rejected() {
        let db = test_db().await;
        let mut update = SettingsUpdate::from(get_settings(db.pool()).await.unwrap());
        update.temperature = 3.5;

        let result = update_settings(db.pool(), &update).await;
        assert!(matches!(result, Err(DatabaseError::Invalid(_))));
    }
}
