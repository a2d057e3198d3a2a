//! Bounded context assembly for model calls.
//!
//! The instruction is cut to its character budget at use time, so a stored
//! instruction longer than the budget never reaches the model in full.

use brain_core::{truncate_chars, GenerationRequest, HistoryMessage};
use database::{learned_rule, message, AutomationSettings, Database, Direction, Message};

use crate::classifier::ContextClassifier;
use crate::config::PipelineConfig;

/// Appended to knowledge text that was cut.
pub const KNOWLEDGE_MARKER: &str = "\n[...more products available on request]";

const KNOWLEDGE_HEADING: &str = "Product information:";
const RULES_HEADING: &str = "Rules learned from past conversations:";

/// The instruction sent to the model, kept in parts so each bound can be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledInstruction {
    /// Stored instruction, truncated to the budget.
    pub base: String,
    /// Capped knowledge text, when the classifier asked for it.
    pub knowledge: Option<String>,
    /// Active learned rules, when learning mode is on.
    pub rules: Vec<String>,
}

impl AssembledInstruction {
    /// Render the full system prompt.
    pub fn render(&self) -> String {
        let mut out = self.base.clone();

        if let Some(knowledge) = &self.knowledge {
            push_section(&mut out, KNOWLEDGE_HEADING, knowledge);
        }

        if !self.rules.is_empty() {
            let rules = self
                .rules
                .iter()
                .map(|r| format!("- {}", r))
                .collect::<Vec<_>>()
                .join("\n");
            push_section(&mut out, RULES_HEADING, &rules);
        }

        out
    }
}

fn push_section(out: &mut String, heading: &str, body: &str) {
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(heading);
    out.push('\n');
    out.push_str(body);
}

/// Cap knowledge text, appending [`KNOWLEDGE_MARKER`] when anything was cut.
pub fn cap_knowledge(knowledge: &str, max_chars: usize) -> String {
    let capped = truncate_chars(knowledge, max_chars);
    if capped.len() < knowledge.len() {
        format!("{}{}", capped, KNOWLEDGE_MARKER)
    } else {
        capped.to_string()
    }
}

/// Assemble the instruction for one reply.
pub fn assemble_instruction(
    settings: &AutomationSettings,
    trigger_text: &str,
    classifier: &dyn ContextClassifier,
    active_rules: Vec<String>,
    config: &PipelineConfig,
) -> AssembledInstruction {
    let base = truncate_chars(&settings.instructions, config.instruction_max_chars).to_string();

    let knowledge = if !settings.knowledge.trim().is_empty()
        && classifier.should_include_supplementary_context(trigger_text)
    {
        Some(cap_knowledge(settings.knowledge.trim(), config.knowledge_max_chars))
    } else {
        None
    };

    let rules = if settings.learning_enabled {
        active_rules
    } else {
        Vec::new()
    };

    AssembledInstruction {
        base,
        knowledge,
        rules,
    }
}

/// Map stored messages to model history: inbound as contact, outbound as assistant.
pub fn history_from_messages(messages: &[Message]) -> Vec<HistoryMessage> {
    messages
        .iter()
        .map(|m| match m.direction {
            Direction::In => HistoryMessage::contact(m.summary()),
            Direction::Out => HistoryMessage::assistant(m.summary()),
        })
        .collect()
}

/// Build a generation request from settings and assembled parts.
pub fn generation_request(
    settings: &AutomationSettings,
    instruction: &AssembledInstruction,
    history: Vec<HistoryMessage>,
    message: impl Into<String>,
) -> GenerationRequest {
    GenerationRequest {
        model: settings.model.clone(),
        instruction: instruction.render(),
        history,
        message: message.into(),
        max_tokens: u32::try_from(settings.max_tokens.max(1)).unwrap_or(u32::MAX),
        temperature: settings.temperature as f32,
    }
}

/// Everything the model sees for one reply.
#[derive(Debug, Clone)]
pub struct ReplyContext {
    pub instruction: AssembledInstruction,
    pub request: GenerationRequest,
}

/// Load history and rules and assemble the request answering `trigger`.
///
/// History is the `history_depth` messages stored before the trigger; the
/// trigger itself is never part of it.
pub async fn load_reply_context(
    db: &Database,
    settings: &AutomationSettings,
    trigger: &Message,
    trigger_text: &str,
    classifier: &dyn ContextClassifier,
    config: &PipelineConfig,
) -> database::Result<ReplyContext> {
    let history = message::recent_history(
        db.pool(),
        trigger.conversation_id,
        Some(trigger.id),
        settings.history_depth,
    )
    .await?;

    let rules = if settings.learning_enabled {
        learned_rule::list_active_rules(db.pool()).await?
    } else {
        Vec::new()
    };

    let instruction = assemble_instruction(settings, trigger_text, classifier, rules, config);
    let request = generation_request(
        settings,
        &instruction,
        history_from_messages(&history),
        trigger_text,
    );

    Ok(ReplyContext {
        instruction,
        request,
    })
}
