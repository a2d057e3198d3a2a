//! Operator-triggered passes over a whole conversation: analysis and follow-up.
//!
//! Unlike automated replies these report failures straight back to the
//! operator who asked for them; nothing is escalated.

use std::sync::Arc;

use brain_core::{Brain, BrainError, Generation, GenerationRequest};
use database::conversation::{self, ConversationFlag};
use database::{automation_log, learned_rule, message, settings, Database, Direction, Message};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::info;

use crate::channel::OutboundContent;
use crate::classifier::{ContextClassifier, KeywordClassifier};
use crate::config::PipelineConfig;
use crate::context::{assemble_instruction, generation_request, history_from_messages};
use crate::dispatcher::{Author, DispatchedMessage, OutboundDispatcher};
use crate::error::OrchestratorError;

const ANALYSIS_INSTRUCTION: &str = "You review customer conversations of a small shop that sells \
over WhatsApp. Read the transcript and answer with a single JSON object and nothing else: \
{\"should_call\": true|false, \"rule\": string or null, \"summary\": string}. \
Set should_call to true when a phone call would likely close a sale or resolve a problem. \
Put in rule one short, general instruction that would have improved the assistant's replies, \
or null if there is none. Write summary in one or two sentences.";

/// Message the model answers when asked for a follow-up.
pub const FOLLOW_UP_CUE: &str = "[The customer has not replied in a while. Write one short, \
friendly follow-up message that continues the conversation. Do not repeat earlier messages.]";

const FOLLOW_UP_LOG_TEXT: &str = "[follow-up]";

/// The model's verdict on a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub should_call: bool,
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub summary: String,
}

/// What an analysis pass changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub conversation_id: i64,
    pub analysis: Analysis,
    /// Inactive rule stored from the suggestion, when learning mode is on.
    pub rule_id: Option<i64>,
}

/// Parse the model's analysis answer.
///
/// Tolerates code fences and text around the object.
pub fn parse_analysis(text: &str) -> Result<Analysis, OrchestratorError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(OrchestratorError::InvalidAnalysis(
                "answer contains no JSON object".to_string(),
            ))
        }
    };

    let mut analysis: Analysis =
        serde_json::from_str(json).map_err(|e| OrchestratorError::InvalidAnalysis(e.to_string()))?;
    analysis.rule = analysis
        .rule
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    Ok(analysis)
}

/// Render stored messages as a plain transcript.
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.direction {
                Direction::In => "Customer",
                Direction::Out => "Shop",
            };
            format!("{}: {}", speaker, m.summary())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs analysis and follow-up passes.
#[derive(Clone)]
pub struct Analyst {
    db: Database,
    brain: Arc<dyn Brain>,
    dispatcher: OutboundDispatcher,
    classifier: Arc<dyn ContextClassifier>,
    config: PipelineConfig,
}

impl Analyst {
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
            config,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ContextClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Review a conversation: flag it for a call and propose a rule.
    pub async fn analyze(&self, conversation_id: i64) -> Result<AnalysisReport, OrchestratorError> {
        let conv = conversation::get_conversation(self.db.pool(), conversation_id).await?;
        let settings = settings::get_settings(self.db.pool()).await?;
        let history =
            message::recent_history(self.db.pool(), conv.id, None, self.config.analysis_history)
                .await?;
        if history.is_empty() {
            return Err(OrchestratorError::InvalidAnalysis(
                "conversation has no messages".to_string(),
            ));
        }

        let request = GenerationRequest {
            model: settings.model.clone(),
            instruction: ANALYSIS_INSTRUCTION.to_string(),
            history: Vec::new(),
            message: transcript(&history),
            max_tokens: u32::try_from(settings.max_tokens.max(1)).unwrap_or(u32::MAX),
            temperature: 0.0,
        };

        let generation = self.generate(request).await?;
        let analysis = parse_analysis(&generation.text)?;

        if analysis.should_call {
            conversation::set_flag(self.db.pool(), conv.id, ConversationFlag::ShouldCall, true)
                .await?;
        }

        let rule_id = match (&analysis.rule, settings.learning_enabled) {
            (Some(rule), true) => {
                Some(learned_rule::create_rule(self.db.pool(), rule, false, Some(conv.id)).await?.id)
            }
            _ => None,
        };

        info!(
            conversation_id,
            should_call = analysis.should_call,
            rule_suggested = rule_id.is_some(),
            "Conversation analyzed"
        );

        Ok(AnalysisReport {
            conversation_id,
            analysis,
            rule_id,
        })
    }

    /// Generate and send a follow-up message authored by automation.
    pub async fn follow_up(&self, conversation_id: i64) -> Result<DispatchedMessage, OrchestratorError> {
        let conv = conversation::get_conversation(self.db.pool(), conversation_id).await?;
        let settings = settings::get_settings(self.db.pool()).await?;
        let history =
            message::recent_history(self.db.pool(), conv.id, None, settings.history_depth).await?;

        let last_inbound = history
            .iter()
            .rev()
            .find(|m| m.direction == Direction::In)
            .map(Message::summary)
            .unwrap_or_default();

        let rules = if settings.learning_enabled {
            learned_rule::list_active_rules(self.db.pool()).await?
        } else {
            Vec::new()
        };

        let instruction = assemble_instruction(
            &settings,
            &last_inbound,
            self.classifier.as_ref(),
            rules,
            &self.config,
        );
        let request = generation_request(
            &settings,
            &instruction,
            history_from_messages(&history),
            FOLLOW_UP_CUE,
        );

        let generation = self.generate(request).await?;
        let text = generation.text.trim();

        let dispatched = self
            .dispatcher
            .dispatch_to_conversation(conv.id, OutboundContent::text(text), Author::Automation)
            .await?;

        conversation::touch_follow_up(self.db.pool(), conv.id).await?;
        automation_log::insert_log(
            self.db.pool(),
            &automation_log::NewLogEntry {
                conversation_id: Some(conv.id),
                inbound_text: FOLLOW_UP_LOG_TEXT,
                reply: Some(text),
                tokens_used: i64::from(generation.tokens_used),
                success: true,
                error: None,
            },
        )
        .await?;

        info!(conversation_id, message_id = dispatched.message.id, "Follow-up sent");
        Ok(dispatched)
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, OrchestratorError> {
        let generation = timeout(self.config.generation_timeout, self.brain.generate(request))
            .await
            .map_err(|_| BrainError::Timeout)??;

        if generation.text.trim().is_empty() {
            return Err(BrainError::EmptyResponse.into());
        }
        Ok(generation)
    }
}
