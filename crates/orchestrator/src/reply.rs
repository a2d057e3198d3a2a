//! Automated replies.
//!
//! One attempt per inbound message, with exactly one of two endings: a reply
//! is sent and logged, or nothing is sent and the conversation is flagged for
//! a human. Failed attempts are never retried.

use std::sync::Arc;

use brain_core::{Brain, BrainError, Generation, SpeechRequest, SpeechSynthesizer, Transcriber};
use database::conversation::{self, ConversationFlag};
use database::{
    automation_log, message, settings, AutomationSettings, ContentType, Conversation, Database,
    Direction, Message,
};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use whatsapp_cloud::MediaKind;

use crate::channel::OutboundContent;
use crate::classifier::{ContextClassifier, KeywordClassifier};
use crate::config::PipelineConfig;
use crate::context::load_reply_context;
use crate::dispatcher::{Author, DispatchRequest, DispatchedMessage, OutboundDispatcher};
use crate::error::{DispatchError, OrchestratorError};

/// Why no reply was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Automation is switched off globally.
    AutomationDisabled,
    /// Automation is switched off for this conversation.
    ConversationDisabled,
    /// The conversation is waiting for an operator.
    NeedsHumanAttention,
    /// The message is outbound.
    NotInbound,
}

/// How a reply attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// A reply was sent.
    Sent {
        /// Stored outbound row; `None` when the channel accepted the reply
        /// but storing it failed.
        message_id: Option<i64>,
        wa_message_id: String,
        tokens_used: u32,
        /// Whether the reply went out as synthesized audio.
        audio: bool,
    },
    /// Nothing was sent; the conversation now needs human attention.
    Escalated { error: String },
    /// No attempt was made.
    Skipped(SkipReason),
}

/// A reply the channel accepted.
struct Delivery {
    message_id: Option<i64>,
    wa_message_id: String,
    audio: bool,
}

impl Delivery {
    /// A dispatch counts as delivered once the channel accepts it, even when
    /// storing the message failed afterwards.
    fn from_dispatch(
        result: Result<DispatchedMessage, DispatchError>,
        audio: bool,
    ) -> Result<Self, DispatchError> {
        match result {
            Ok(dispatched) => Ok(Self {
                message_id: Some(dispatched.message.id),
                wa_message_id: dispatched.message.wa_message_id.unwrap_or_default(),
                audio,
            }),
            Err(DispatchError::Unrecorded {
                wa_message_id,
                source,
            }) => {
                warn!(wa_message_id = %wa_message_id, error = %source, "Reply delivered but not stored");
                Ok(Self {
                    message_id: None,
                    wa_message_id,
                    audio,
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Whether a conversation may receive an automated reply.
///
/// Returns the first reason that blocks it, or `None` when eligible.
pub fn eligibility(settings: &AutomationSettings, conversation: &Conversation) -> Option<SkipReason> {
    if !settings.enabled {
        Some(SkipReason::AutomationDisabled)
    } else if conversation.automation_disabled {
        Some(SkipReason::ConversationDisabled)
    } else if conversation.needs_human_attention {
        Some(SkipReason::NeedsHumanAttention)
    } else {
        None
    }
}

/// Generates and sends automated replies.
#[derive(Clone)]
pub struct ReplyOrchestrator {
    db: Database,
    brain: Arc<dyn Brain>,
    dispatcher: OutboundDispatcher,
    classifier: Arc<dyn ContextClassifier>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    config: PipelineConfig,
}

impl ReplyOrchestrator {
    /// Create an orchestrator with the default keyword classifier and no audio support.
    pub fn new(
        db: Database,
        brain: Arc<dyn Brain>,
        dispatcher: OutboundDispatcher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            brain,
            dispatcher,
            classifier: Arc::new(KeywordClassifier::default()),
            synthesizer: None,
            transcriber: None,
            config,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ContextClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Attempt an automated reply to a stored inbound message.
    ///
    /// Settings are read fresh, so an update is honored by the next attempt.
    /// Model, timeout, and dispatch failures end as [`ReplyOutcome::Escalated`];
    /// only storage failures are returned as errors.
    pub async fn reply_to(
        &self,
        conversation_id: i64,
        message_id: i64,
    ) -> Result<ReplyOutcome, OrchestratorError> {
        let trigger = message::get_message(self.db.pool(), message_id).await?;
        if trigger.conversation_id != conversation_id {
            return Err(OrchestratorError::NotFound(format!(
                "message {} in conversation {}",
                message_id, conversation_id
            )));
        }
        if trigger.direction != Direction::In {
            return Ok(ReplyOutcome::Skipped(SkipReason::NotInbound));
        }

        let conv = conversation::get_conversation(self.db.pool(), conversation_id).await?;
        let settings = settings::get_settings(self.db.pool()).await?;

        if let Some(reason) = eligibility(&settings, &conv) {
            debug!(conversation_id, ?reason, "Automated reply skipped");
            return Ok(ReplyOutcome::Skipped(reason));
        }

        let trigger_text = match self.trigger_text(&trigger).await {
            Ok(text) => text,
            Err(error) => return self.escalate(conversation_id, &trigger.summary(), error).await,
        };

        let context = load_reply_context(
            &self.db,
            &settings,
            &trigger,
            &trigger_text,
            self.classifier.as_ref(),
            &self.config,
        )
        .await?;

        debug!(
            conversation_id,
            history = context.request.history.len(),
            knowledge = context.instruction.knowledge.is_some(),
            rules = context.instruction.rules.len(),
            "Generating reply"
        );

        let generation = match self.generate(context.request).await {
            Ok(generation) => generation,
            Err(e) => return self.escalate(conversation_id, &trigger_text, e.to_string()).await,
        };
        let reply = generation.text.trim();

        let delivery = match self.deliver(&settings, &conv, &trigger, reply).await {
            Ok(delivery) => delivery,
            Err(e) => return self.escalate(conversation_id, &trigger_text, e).await,
        };

        automation_log::insert_log(
            self.db.pool(),
            &automation_log::NewLogEntry {
                conversation_id: Some(conversation_id),
                inbound_text: &trigger_text,
                reply: Some(reply),
                tokens_used: i64::from(generation.tokens_used),
                success: true,
                error: None,
            },
        )
        .await?;

        info!(
            conversation_id,
            message_id = ?delivery.message_id,
            wa_message_id = %delivery.wa_message_id,
            tokens_used = generation.tokens_used,
            audio = delivery.audio,
            brain = self.brain.name(),
            "Automated reply sent"
        );

        Ok(ReplyOutcome::Sent {
            message_id: delivery.message_id,
            wa_message_id: delivery.wa_message_id,
            tokens_used: generation.tokens_used,
            audio: delivery.audio,
        })
    }

    /// One bounded model call. Empty output counts as a failure.
    async fn generate(&self, request: brain_core::GenerationRequest) -> Result<Generation, BrainError> {
        let generation = timeout(self.config.generation_timeout, self.brain.generate(request))
            .await
            .map_err(|_| BrainError::Timeout)??;

        if generation.text.trim().is_empty() {
            return Err(BrainError::EmptyResponse);
        }
        Ok(generation)
    }

    /// Text the model answers: the transcript for audio when a transcriber
    /// is configured, otherwise the stored body or content summary.
    async fn trigger_text(&self, trigger: &Message) -> Result<String, String> {
        if trigger.content_type == ContentType::Audio {
            if let (Some(transcriber), Some(media_ref)) = (&self.transcriber, &trigger.media_ref) {
                let media = self
                    .dispatcher
                    .fetch_media(media_ref)
                    .await
                    .map_err(|e| format!("audio download failed: {}", e))?;

                let transcript = timeout(
                    self.config.generation_timeout,
                    transcriber.transcribe(media.bytes, &media.mime_type),
                )
                .await
                .map_err(|_| format!("transcription failed: {}", BrainError::Timeout))?
                .map_err(|e| format!("transcription failed: {}", e))?;

                let transcript = transcript.trim();
                if transcript.is_empty() {
                    return Err(format!("transcription failed: {}", BrainError::EmptyResponse));
                }
                debug!(message_id = trigger.id, "Audio transcribed");
                return Ok(transcript.to_string());
            }
        }

        Ok(match trigger.body.as_deref().map(str::trim) {
            Some(body) if !body.is_empty() && trigger.content_type == ContentType::Text => {
                body.to_string()
            }
            _ => trigger.summary(),
        })
    }

    /// Send the reply, as audio when configured and the trigger was audio.
    ///
    /// Audio failures fall back to text; only a failed text send is an error.
    /// Once the channel accepted a message nothing else is sent.
    async fn deliver(
        &self,
        settings: &AutomationSettings,
        conv: &Conversation,
        trigger: &Message,
        reply: &str,
    ) -> Result<Delivery, String> {
        if settings.audio_replies && trigger.content_type == ContentType::Audio {
            if let Some(synthesizer) = &self.synthesizer {
                match self.send_audio(synthesizer.as_ref(), settings, conv, reply).await {
                    Ok(delivery) => return Ok(delivery),
                    Err(error) => {
                        warn!(conversation_id = conv.id, %error, "Audio reply failed, sending text");
                    }
                }
            }
        }

        let result = self
            .dispatcher
            .dispatch(DispatchRequest::new(
                conv.wa_id.clone(),
                OutboundContent::text(reply),
                Author::Automation,
            ))
            .await;
        Delivery::from_dispatch(result, false).map_err(|e| format!("dispatch failed: {}", e))
    }

    async fn send_audio(
        &self,
        synthesizer: &dyn SpeechSynthesizer,
        settings: &AutomationSettings,
        conv: &Conversation,
        reply: &str,
    ) -> Result<Delivery, String> {
        let request = SpeechRequest {
            text: reply.to_string(),
            voice: settings.voice.clone(),
            speed: settings.voice_speed as f32,
        };

        let audio = timeout(self.config.generation_timeout, synthesizer.synthesize(request))
            .await
            .map_err(|_| BrainError::Timeout.to_string())?
            .map_err(|e| e.to_string())?;

        let media_ref = self
            .dispatcher
            .upload_media(audio.bytes, &audio.mime_type)
            .await
            .map_err(|e| e.to_string())?;

        let result = self
            .dispatcher
            .dispatch(DispatchRequest::new(
                conv.wa_id.clone(),
                OutboundContent::Media {
                    kind: MediaKind::Audio,
                    media_ref,
                    caption: None,
                },
                Author::Automation,
            ))
            .await;
        Delivery::from_dispatch(result, true).map_err(|e| e.to_string())
    }

    /// Record the failure and hand the conversation to a human.
    async fn escalate(
        &self,
        conversation_id: i64,
        inbound_text: &str,
        error: String,
    ) -> Result<ReplyOutcome, OrchestratorError> {
        warn!(conversation_id, %error, "Automated reply failed, flagging for human attention");

        automation_log::insert_log(
            self.db.pool(),
            &automation_log::NewLogEntry {
                conversation_id: Some(conversation_id),
                inbound_text,
                reply: None,
                tokens_used: 0,
                success: false,
                error: Some(&error),
            },
        )
        .await?;

        conversation::set_flag(
            self.db.pool(),
            conversation_id,
            ConversationFlag::NeedsHumanAttention,
            true,
        )
        .await?;

        Ok(ReplyOutcome::Escalated { error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::recording::RecordingChannel;
    use database::{MessageStatus, NewMessage, OrderStatus, SettingsUpdate};
    use mock_brain::{FailingBrain, ScriptedBrain};

    fn conversation(automation_disabled: bool, needs_human_attention: bool) -> Conversation {
        Conversation {
            id: 1,
            wa_id: "521".to_string(),
            display_name: None,
            pinned: false,
            label_id: None,
            order_status: OrderStatus::None,
            automation_disabled,
            needs_human_attention,
            should_call: false,
            assigned_operator_id: None,
            last_message: None,
            last_message_at: None,
            last_message_id: None,
            last_follow_up_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    async fn setup(brain: Arc<dyn Brain>) -> (Database, Arc<RecordingChannel>, ReplyOrchestrator) {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();

        let mut update = SettingsUpdate::from(settings::get_settings(db.pool()).await.unwrap());
        update.enabled = true;
        update.instructions = "Eres el asistente de la tienda.".to_string();
        settings::update_settings(db.pool(), &update).await.unwrap();

        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = OutboundDispatcher::new(db.clone(), channel.clone(), Duration::from_secs(5));
        let orchestrator = ReplyOrchestrator::new(db.clone(), brain, dispatcher, PipelineConfig::default());
        (db, channel, orchestrator)
    }

    async fn inbound(db: &Database, body: &str) -> Message {
        let (conv, _) = conversation::upsert_conversation(db.pool(), "5215550123", None)
            .await
            .unwrap();
        message::insert_message(
            db.pool(),
            &NewMessage {
                conversation_id: conv.id,
                wa_message_id: Some(format!("wamid.IN.{}", body.len())),
                direction: Direction::In,
                content_type: ContentType::Text,
                body: Some(body.to_string()),
                media_ref: None,
                status: MessageStatus::Received,
                automated: false,
                operator_id: None,
                timestamp: 1_700_000_000,
                raw_payload: None,
            },
        )
        .await
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_eligibility_order() {
        let mut s = AutomationSettings {
            enabled: false,
            instructions: String::new(),
            knowledge: String::new(),
            model: "m".to_string(),
            max_tokens: 100,
            temperature: 0.5,
            history_depth: 5,
            audio_replies: false,
            voice: "alloy".to_string(),
            voice_speed: 1.0,
            learning_enabled: false,
            updated_at: String::new(),
        };

        assert_eq!(
            eligibility(&s, &conversation(true, true)),
            Some(SkipReason::AutomationDisabled)
        );
        s.enabled = true;
        assert_eq!(
            eligibility(&s, &conversation(true, true)),
            Some(SkipReason::ConversationDisabled)
        );
        assert_eq!(
            eligibility(&s, &conversation(false, true)),
            Some(SkipReason::NeedsHumanAttention)
        );
        assert_eq!(eligibility(&s, &conversation(false, false)), None);
    }

    #[tokio::test]
    async fn test_success_sends_and_logs() {
        let brain = Arc::new(ScriptedBrain::always("¡Hola! ¿Qué producto buscas?").with_tokens(17));
        let (db, channel, orchestrator) = setup(brain.clone()).await;
        let trigger = inbound(&db, "hola").await;

        let outcome = orchestrator
            .reply_to(trigger.conversation_id, trigger.id)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ReplyOutcome::Sent {
                tokens_used: 17,
                audio: false,
                ..
            }
        ));
        assert_eq!(channel.sent().len(), 1);

        let request = brain.last_request().unwrap();
        assert_eq!(request.message, "hola");
        assert!(request.history.is_empty());

        let logs = automation_log::list_logs(db.pool(), Some(trigger.conversation_id), 10)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].success);
        assert_eq!(logs[0].tokens_used, 17);
    }

    #[tokio::test]
    async fn test_failure_escalates() {
        let brain = Arc::new(FailingBrain::processing("model overloaded"));
        let (db, channel, orchestrator) = setup(brain).await;
        let trigger = inbound(&db, "hola").await;

        let outcome = orchestrator
            .reply_to(trigger.conversation_id, trigger.id)
            .await
            .unwrap();
        assert!(matches!(outcome, ReplyOutcome::Escalated { .. }));
        assert!(channel.sent().is_empty());

        let conv = conversation::get_conversation(db.pool(), trigger.conversation_id)
            .await
            .unwrap();
        assert!(conv.needs_human_attention);

        // Flagged conversations stay silent.
        let again = orchestrator
            .reply_to(trigger.conversation_id, trigger.id)
            .await
            .unwrap();
        assert_eq!(again, ReplyOutcome::Skipped(SkipReason::NeedsHumanAttention));
    }

    #[tokio::test]
    async fn test_outbound_trigger_skipped() {
        let brain = Arc::new(ScriptedBrain::always("x"));
        let (_db, _channel, orchestrator) = setup(brain.clone()).await;
        let sent = orchestrator
            .dispatcher
            .dispatch(DispatchRequest::new(
                "5215550999",
                OutboundContent::text("hola"),
                Author::Operator(None),
            ))
            .await
            .unwrap();

        let outcome = orchestrator
            .reply_to(sent.conversation_id, sent.message.id)
            .await
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::Skipped(SkipReason::NotInbound));
        assert_eq!(brain.call_count(), 0);
    }
}
