//! Inbound event ingestion, conversation state, and automated replies.
//!
//! This crate provides the [`Pipeline`] type which wires together the parts
//! that turn provider webhook batches into stored conversations and, when
//! automation is on, generated replies.
//!
//! # Features
//!
//! - Idempotent ingestion keyed by the provider message id
//! - Monotonic delivery status reconciliation
//! - Weighted assignment of new conversations to operators
//! - Bounded context assembly with keyword-gated product knowledge
//! - Fail-closed automated replies: a failed attempt sends nothing and
//!   flags the conversation for a human
//! - Outbound dispatch that records only what the channel accepted
//!
//! # Architecture
//!
//! ```text
//! Webhook batch (from inbox-server)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       EVENT INGESTOR                        │
//! │                                                             │
//! │  messages → upsert conversation → balancer (if new)         │
//! │           → insert message (dedup) → last-message cache     │
//! │           → eligible? spawn reply                           │
//! │  statuses → status reconciler (monotonic)                   │
//! └─────────────────────────────────────────────────────────────┘
//!          ↓ (own task per reply)
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      REPLY ORCHESTRATOR                     │
//! │                                                             │
//! │  settings (fresh) → context → brain (timeout)               │
//! │     ok  → outbound dispatcher → log success                 │
//! │     err → log failure → needs_human_attention = true        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use orchestrator::Pipeline;
//!
//! let pipeline = Pipeline::builder(db, Arc::new(cloud_client), Arc::new(brain))
//!     .with_synthesizer(synthesizer)
//!     .build();
//!
//! let payload: whatsapp_cloud::WebhookPayload = serde_json::from_slice(&body)?;
//! let report = pipeline.ingestor().ingest(&payload).await;
//! println!("stored {} messages", report.stored());
//! ```

mod analyst;
mod balancer;
mod channel;
mod classifier;
mod config;
mod context;
mod dispatcher;
mod error;
mod ingestor;
mod reconciler;
mod reply;
#[cfg(any(test, feature = "test-util"))]
mod recording;

use std::sync::Arc;

use brain_core::{Brain, SpeechSynthesizer, Transcriber};
use database::Database;

pub use analyst::{parse_analysis, transcript, Analysis, AnalysisReport, Analyst, FOLLOW_UP_CUE};
pub use balancer::{select_operator, AgentBalancer};
pub use channel::{Channel, OutboundContent};
pub use classifier::{ContextClassifier, FixedClassifier, KeywordClassifier, PURCHASE_KEYWORDS};
pub use config::{PipelineConfig, DEFAULT_INSTRUCTION_MAX_CHARS, DEFAULT_KNOWLEDGE_MAX_CHARS};
pub use context::{
    assemble_instruction, cap_knowledge, generation_request, history_from_messages,
    load_reply_context, AssembledInstruction, ReplyContext, KNOWLEDGE_MARKER,
};
pub use dispatcher::{Author, DispatchRequest, DispatchedMessage, OutboundDispatcher};
pub use error::{DispatchError, OrchestratorError};
pub use ingestor::{content_type_for, receipt_status, EventIngestor, IngestReport, NotificationOutcome};
pub use reconciler::{StatusOutcome, StatusReconciler};
pub use reply::{eligibility, ReplyOrchestrator, ReplyOutcome, SkipReason};
#[cfg(any(test, feature = "test-util"))]
pub use recording::{ChannelBehavior, RecordingChannel, SentRecord};

/// All pipeline components, sharing one database, channel, and brain.
#[derive(Clone)]
pub struct Pipeline {
    db: Database,
    dispatcher: OutboundDispatcher,
    replies: ReplyOrchestrator,
    ingestor: EventIngestor,
    reconciler: StatusReconciler,
    balancer: AgentBalancer,
    analyst: Analyst,
}

impl Pipeline {
    /// Start building a pipeline.
    pub fn builder(db: Database, channel: Arc<dyn Channel>, brain: Arc<dyn Brain>) -> PipelineBuilder {
        PipelineBuilder {
            db,
            channel,
            brain,
            classifier: Arc::new(KeywordClassifier::default()),
            synthesizer: None,
            transcriber: None,
            config: PipelineConfig::default(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn dispatcher(&self) -> &OutboundDispatcher {
        &self.dispatcher
    }

    pub fn replies(&self) -> &ReplyOrchestrator {
        &self.replies
    }

    pub fn ingestor(&self) -> &EventIngestor {
        &self.ingestor
    }

    pub fn reconciler(&self) -> &StatusReconciler {
        &self.reconciler
    }

    pub fn balancer(&self) -> &AgentBalancer {
        &self.balancer
    }

    pub fn analyst(&self) -> &Analyst {
        &self.analyst
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    db: Database,
    channel: Arc<dyn Channel>,
    brain: Arc<dyn Brain>,
    classifier: Arc<dyn ContextClassifier>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Replace the keyword classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn ContextClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Enable audio replies.
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Enable transcription of inbound audio.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Pipeline {
        let dispatcher =
            OutboundDispatcher::new(self.db.clone(), self.channel, self.config.send_timeout);

        let mut replies = ReplyOrchestrator::new(
            self.db.clone(),
            self.brain.clone(),
            dispatcher.clone(),
            self.config.clone(),
        )
        .with_classifier(self.classifier.clone());
        if let Some(synthesizer) = self.synthesizer {
            replies = replies.with_synthesizer(synthesizer);
        }
        if let Some(transcriber) = self.transcriber {
            replies = replies.with_transcriber(transcriber);
        }

        let analyst = Analyst::new(self.db.clone(), self.brain, dispatcher.clone(), self.config)
            .with_classifier(self.classifier);

        Pipeline {
            ingestor: EventIngestor::new(self.db.clone(), replies.clone()),
            reconciler: StatusReconciler::new(self.db.clone()),
            balancer: AgentBalancer::new(self.db.clone()),
            db: self.db,
            dispatcher,
            replies,
            analyst,
        }
    }
}
