//! End-to-end pipeline behavior against an in-memory database, scripted
//! brains, and a recording channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brain_core::Brain;
use database::conversation::{self, ConversationFlag};
use database::{
    automation_log, message, operator, settings, ContentType, Database, Direction, MessageStatus,
    SettingsUpdate,
};
use mock_brain::{DelayedBrain, EchoBrain, MockSynthesizer, MockTranscriber, ScriptedBrain};
use orchestrator::{
    Author, Channel, ChannelBehavior, DispatchRequest, IngestReport, NotificationOutcome, OutboundContent,
    Pipeline, PipelineConfig, RecordingChannel, ReplyOutcome, SkipReason, StatusOutcome,
    KNOWLEDGE_MARKER,
};
use serde_json::{json, Value};
use whatsapp_cloud::{CloudError, MediaKind, WebhookPayload};

const CATALOG: &str = "Berberina 500mg, 60 cápsulas: $350 MXN\nMagnesio glicinato: $290 MXN";

async fn test_db() -> Database {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();
    db
}

async fn configure(db: &Database, f: impl FnOnce(&mut SettingsUpdate)) {
    let mut update = SettingsUpdate::from(settings::get_settings(db.pool()).await.unwrap());
    update.enabled = true;
    update.instructions = "Eres el asistente de ventas de una tienda naturista.".to_string();
    update.knowledge = CATALOG.to_string();
    f(&mut update);
    settings::update_settings(db.pool(), &update).await.unwrap();
}

/// Accepts every send, then drops the messages table so storing the sent
/// message fails.
struct UnrecordableChannel {
    inner: Arc<RecordingChannel>,
    db: Database,
}

#[async_trait]
impl Channel for UnrecordableChannel {
    async fn send(&self, to: &str, content: &OutboundContent) -> Result<String, CloudError> {
        let wa_message_id = self.inner.send(to, content).await?;
        sqlx::query("DROP TABLE IF EXISTS messages")
            .execute(self.db.pool())
            .await
            .map_err(|e| CloudError::UnexpectedResponse(e.to_string()))?;
        Ok(wa_message_id)
    }

    async fn upload_media(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, CloudError> {
        self.inner.upload_media(bytes, mime_type).await
    }
}

fn pipeline(db: &Database, channel: Arc<RecordingChannel>, brain: Arc<dyn Brain>) -> Pipeline {
    Pipeline::builder(db.clone(), channel, brain).build()
}

fn batch(value: Value) -> WebhookPayload {
    serde_json::from_value(json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "102290129340398",
            "changes": [{ "field": "messages", "value": value }]
        }]
    }))
    .unwrap()
}

fn text_batch(wa_id: &str, name: &str, wamid: &str, body: &str) -> WebhookPayload {
    batch(json!({
        "messaging_product": "whatsapp",
        "metadata": { "display_phone_number": "15550783881", "phone_number_id": "106540352242922" },
        "contacts": [{ "profile": { "name": name }, "wa_id": wa_id }],
        "messages": [{
            "from": wa_id,
            "id": wamid,
            "timestamp": "1700000000",
            "type": "text",
            "text": { "body": body }
        }]
    }))
}

fn audio_batch(wa_id: &str, wamid: &str) -> WebhookPayload {
    batch(json!({
        "messaging_product": "whatsapp",
        "contacts": [{ "profile": { "name": "Luis" }, "wa_id": wa_id }],
        "messages": [{
            "from": wa_id,
            "id": wamid,
            "timestamp": "1700000100",
            "type": "audio",
            "audio": { "id": "media-in-1", "mime_type": "audio/ogg; codecs=opus", "voice": true }
        }]
    }))
}

fn status_batch(statuses: Value) -> WebhookPayload {
    batch(json!({ "messaging_product": "whatsapp", "statuses": statuses }))
}

fn single_reply(report: &IngestReport) -> Option<ReplyOutcome> {
    match report.outcomes.as_slice() {
        [NotificationOutcome::Stored { reply, .. }] => reply.clone(),
        other => panic!("expected one stored message, got {other:?}"),
    }
}

#[tokio::test]
async fn new_contact_purchase_question_gets_catalog_reply() {
    let db = test_db().await;
    configure(&db, |_| {}).await;
    let op = operator::create_operator(db.pool(), "maria", "María", "pw", 1)
        .await
        .unwrap();

    let brain = Arc::new(ScriptedBrain::always("La berberina cuesta $350 MXN.").with_tokens(23));
    let channel = Arc::new(RecordingChannel::new());
    let pipeline = pipeline(&db, channel.clone(), brain.clone());

    let report = pipeline
        .ingestor()
        .ingest(&text_batch("5215550001", "Ana", "wamid.NEW1", "cuánto cuesta la berberina"))
        .await;

    let (conversation_id, created) = match &report.outcomes[0] {
        NotificationOutcome::Stored {
            conversation_id,
            created_conversation,
            ..
        } => (*conversation_id, *created_conversation),
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert!(created);
    assert!(matches!(
        single_reply(&report),
        Some(ReplyOutcome::Sent {
            tokens_used: 23,
            audio: false,
            ..
        })
    ));

    let conv = conversation::get_conversation(db.pool(), conversation_id)
        .await
        .unwrap();
    assert_eq!(conv.display_name.as_deref(), Some("Ana"));
    assert_eq!(conv.assigned_operator_id, Some(op.id));
    assert!(!conv.needs_human_attention);
    assert_eq!(conv.last_message.as_deref(), Some("La berberina cuesta $350 MXN."));

    let messages = message::list_messages(db.pool(), conversation_id, None, 10)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    let inbound = messages.iter().find(|m| m.direction == Direction::In).unwrap();
    assert_eq!(inbound.content_type, ContentType::Text);
    assert_eq!(inbound.status, MessageStatus::Received);
    assert!(inbound.raw_payload.as_deref().unwrap().contains("wamid.NEW1"));
    let outbound = messages.iter().find(|m| m.direction == Direction::Out).unwrap();
    assert!(outbound.automated);
    assert_eq!(outbound.wa_message_id.as_deref(), Some("wamid.OUT.1"));

    let request = brain.last_request().unwrap();
    assert!(request.instruction.contains(CATALOG));
    assert_eq!(request.message, "cuánto cuesta la berberina");
    assert!(request.history.is_empty());

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "5215550001");

    let logs = automation_log::list_logs(db.pool(), Some(conversation_id), 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].success);
    assert_eq!(logs[0].tokens_used, 23);
}

#[tokio::test]
async fn greeting_gets_reply_without_catalog() {
    let db = test_db().await;
    configure(&db, |_| {}).await;
    let brain = Arc::new(ScriptedBrain::always("¡Hola! ¿En qué te ayudo?"));
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), brain.clone());

    pipeline
        .ingestor()
        .ingest(&text_batch("5215550002", "Ana", "wamid.HI", "hola, buenos días"))
        .await;

    let request = brain.last_request().unwrap();
    assert!(!request.instruction.contains(CATALOG));
}

#[tokio::test]
async fn model_timeout_escalates_without_sending() {
    let db = test_db().await;
    configure(&db, |_| {}).await;

    let brain = Arc::new(DelayedBrain::with_millis(ScriptedBrain::always("tarde"), 500));
    let channel = Arc::new(RecordingChannel::new());
    let pipeline = Pipeline::builder(db.clone(), channel.clone(), brain)
        .with_config(PipelineConfig::default().with_generation_timeout(Duration::from_millis(50)))
        .build();

    let report = pipeline
        .ingestor()
        .ingest(&text_batch("5215550003", "Ana", "wamid.SLOW", "precio del magnesio"))
        .await;
    assert!(matches!(single_reply(&report), Some(ReplyOutcome::Escalated { .. })));

    let conv = conversation::get_conversation_by_wa_id(db.pool(), "5215550003")
        .await
        .unwrap()
        .unwrap();
    assert!(conv.needs_human_attention);
    assert_eq!(message::count_messages(db.pool(), conv.id).await.unwrap(), 1);
    assert!(channel.sent().is_empty());

    let logs = automation_log::list_logs(db.pool(), Some(conv.id), 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].success);
    assert!(logs[0].error.is_some());
    assert_eq!(logs[0].reply, None);
}

#[tokio::test]
async fn rejected_send_escalates_and_stores_no_outbound_row() {
    let db = test_db().await;
    configure(&db, |_| {}).await;

    let channel = Arc::new(RecordingChannel::with_behavior(ChannelBehavior::Reject {
        status: 503,
        code: Some(131000),
        message: "Something went wrong".to_string(),
    }));
    let pipeline = pipeline(&db, channel, Arc::new(ScriptedBrain::always("Hola")));

    let report = pipeline
        .ingestor()
        .ingest(&text_batch("5215550004", "Ana", "wamid.REJ", "hola"))
        .await;
    assert!(matches!(single_reply(&report), Some(ReplyOutcome::Escalated { .. })));

    let conv = conversation::get_conversation_by_wa_id(db.pool(), "5215550004")
        .await
        .unwrap()
        .unwrap();
    assert!(conv.needs_human_attention);
    assert_eq!(message::count_messages(db.pool(), conv.id).await.unwrap(), 1);
}

#[tokio::test]
async fn redelivery_stores_one_message_and_replies_once() {
    let db = test_db().await;
    configure(&db, |_| {}).await;
    let brain = Arc::new(ScriptedBrain::always("Hola"));
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), brain.clone());
    let payload = text_batch("5215550005", "Ana", "wamid.ABC", "hola");

    let first = pipeline.ingestor().ingest(&payload).await;
    let second = pipeline.ingestor().ingest(&payload).await;

    assert_eq!(first.stored(), 1);
    assert_eq!(
        second.outcomes,
        vec![NotificationOutcome::Duplicate {
            wa_message_id: "wamid.ABC".to_string()
        }]
    );

    let stored = message::get_message_by_wa_id(db.pool(), "wamid.ABC")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        message::count_messages(db.pool(), stored.conversation_id)
            .await
            .unwrap(),
        2
    );
    assert_eq!(brain.call_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redelivery_is_absorbed() {
    let db = test_db().await;
    configure(&db, |_| {}).await;
    let brain = Arc::new(ScriptedBrain::always("Hola"));
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), brain.clone());
    let payload = text_batch("5215550006", "Ana", "wamid.RACE", "hola");

    let reports = futures::future::join_all((0..4).map(|_| {
        let pipeline = pipeline.clone();
        let payload = payload.clone();
        async move { pipeline.ingestor().ingest(&payload).await }
    }))
    .await;

    let stored: usize = reports.iter().map(IngestReport::stored).sum();
    let duplicates: usize = reports.iter().map(IngestReport::duplicates).sum();
    assert_eq!(stored, 1);
    assert_eq!(duplicates, 3);
    assert_eq!(brain.call_count(), 1);

    let conv = conversation::get_conversation_by_wa_id(db.pool(), "5215550006")
        .await
        .unwrap()
        .unwrap();
    let inbound = message::list_messages(db.pool(), conv.id, None, 10)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.direction == Direction::In)
        .count();
    assert_eq!(inbound, 1);
}

#[tokio::test]
async fn disabled_conversation_is_stored_but_not_answered() {
    let db = test_db().await;
    configure(&db, |_| {}).await;
    let (conv, _) = conversation::upsert_conversation(db.pool(), "5215550007", None)
        .await
        .unwrap();
    conversation::set_flag(db.pool(), conv.id, ConversationFlag::AutomationDisabled, true)
        .await
        .unwrap();

    let brain = Arc::new(ScriptedBrain::always("no debería enviarse"));
    let channel = Arc::new(RecordingChannel::new());
    let pipeline = pipeline(&db, channel.clone(), brain.clone());

    let report = pipeline
        .ingestor()
        .ingest(&text_batch("5215550007", "Ana", "wamid.OFF", "precio?"))
        .await;

    assert_eq!(
        single_reply(&report),
        Some(ReplyOutcome::Skipped(SkipReason::ConversationDisabled))
    );
    assert_eq!(brain.call_count(), 0);
    assert!(channel.sent().is_empty());

    let conv = conversation::get_conversation(db.pool(), conv.id).await.unwrap();
    assert!(!conv.needs_human_attention);
    assert_eq!(conv.last_message.as_deref(), Some("precio?"));
    assert_eq!(message::count_messages(db.pool(), conv.id).await.unwrap(), 1);
}

#[tokio::test]
async fn global_switch_off_skips_replies() {
    let db = test_db().await;
    let brain = Arc::new(ScriptedBrain::always("x"));
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), brain.clone());

    let report = pipeline
        .ingestor()
        .ingest(&text_batch("5215550008", "Ana", "wamid.GLOBAL", "hola"))
        .await;

    assert_eq!(
        single_reply(&report),
        Some(ReplyOutcome::Skipped(SkipReason::AutomationDisabled))
    );
    assert_eq!(brain.call_count(), 0);
}

#[tokio::test]
async fn new_conversations_follow_operator_weights() {
    let db = test_db().await;
    let heavy = operator::create_operator(db.pool(), "heavy", "Heavy", "pw", 3)
        .await
        .unwrap();
    let light = operator::create_operator(db.pool(), "light", "Light", "pw", 1)
        .await
        .unwrap();
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), Arc::new(ScriptedBrain::always("x")));

    for i in 0..8 {
        pipeline
            .ingestor()
            .ingest(&text_batch(
                &format!("52155510{:02}", i),
                "Cliente",
                &format!("wamid.W{}", i),
                "hola",
            ))
            .await;
    }

    let loads = operator::active_operator_loads(db.pool()).await.unwrap();
    let count = |id: i64| loads.iter().find(|l| l.operator_id == id).unwrap().assigned;
    assert_eq!(count(heavy.id), 6);
    assert_eq!(count(light.id), 2);
}

#[tokio::test]
async fn unassigned_conversation_is_assigned_on_next_message() {
    let db = test_db().await;
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), Arc::new(ScriptedBrain::always("x")));

    // No operator yet: first contact stays unassigned.
    pipeline
        .ingestor()
        .ingest(&text_batch("5215550042", "Rosa", "wamid.UA1", "hola"))
        .await;
    let conv = conversation::get_conversation_by_wa_id(db.pool(), "5215550042")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conv.assigned_operator_id, None);

    let op = operator::create_operator(db.pool(), "maria", "María", "pw", 1)
        .await
        .unwrap();
    pipeline
        .ingestor()
        .ingest(&text_batch("5215550042", "Rosa", "wamid.UA2", "¿siguen ahí?"))
        .await;

    let conv = conversation::get_conversation(db.pool(), conv.id).await.unwrap();
    assert_eq!(conv.assigned_operator_id, Some(op.id));
}

#[tokio::test]
async fn long_instruction_is_cut_to_budget() {
    let db = test_db().await;
    configure(&db, |s| s.instructions = "á".repeat(6000)).await;

    let brain = Arc::new(ScriptedBrain::always("Hola"));
    let pipeline = Pipeline::builder(db.clone(), Arc::new(RecordingChannel::new()), brain.clone())
        .with_config(PipelineConfig::default().with_instruction_max_chars(4000))
        .build();

    pipeline
        .ingestor()
        .ingest(&text_batch("5215550009", "Ana", "wamid.LONG", "hola"))
        .await;

    let request = brain.last_request().unwrap();
    assert_eq!(request.instruction.chars().count(), 4000);

    let stored = settings::get_settings(db.pool()).await.unwrap();
    assert_eq!(stored.instructions.chars().count(), 6000);
}

#[tokio::test]
async fn long_catalog_is_capped_with_marker() {
    let db = test_db().await;
    configure(&db, |s| s.knowledge = "x".repeat(5000)).await;

    let brain = Arc::new(ScriptedBrain::always("Hola"));
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), brain.clone());

    pipeline
        .ingestor()
        .ingest(&text_batch("5215550010", "Ana", "wamid.CAT", "¿qué productos tienen?"))
        .await;

    let request = brain.last_request().unwrap();
    assert!(request.instruction.ends_with(KNOWLEDGE_MARKER));
    assert!(!request.instruction.contains(&"x".repeat(3001)));
}

#[tokio::test]
async fn history_excludes_trigger_and_keeps_roles() {
    let db = test_db().await;
    configure(&db, |_| {}).await;
    let brain = Arc::new(ScriptedBrain::new(["¡Hola! ¿Qué buscas?", "Cuesta $350."]));
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), brain.clone());

    pipeline
        .ingestor()
        .ingest(&text_batch("5215550011", "Ana", "wamid.H1", "hola"))
        .await;
    pipeline
        .ingestor()
        .ingest(&text_batch("5215550011", "Ana", "wamid.H2", "precio de la berberina"))
        .await;

    let request = brain.last_request().unwrap();
    assert_eq!(request.message, "precio de la berberina");
    assert_eq!(
        request.history,
        vec![
            brain_core::HistoryMessage::contact("hola"),
            brain_core::HistoryMessage::assistant("¡Hola! ¿Qué buscas?"),
        ]
    );
}

#[tokio::test]
async fn learned_rules_applied_only_in_learning_mode() {
    let db = test_db().await;
    configure(&db, |s| s.learning_enabled = true).await;
    database::learned_rule::create_rule(db.pool(), "Menciona el envío gratis", true, None)
        .await
        .unwrap();
    database::learned_rule::create_rule(db.pool(), "Regla sugerida", false, None)
        .await
        .unwrap();

    let brain = Arc::new(ScriptedBrain::always("Hola"));
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), brain.clone());
    pipeline
        .ingestor()
        .ingest(&text_batch("5215550012", "Ana", "wamid.RULE", "hola"))
        .await;

    let instruction = brain.last_request().unwrap().instruction;
    assert!(instruction.contains("Menciona el envío gratis"));
    assert!(!instruction.contains("Regla sugerida"));
}

#[tokio::test]
async fn receipts_never_move_status_backwards() {
    let db = test_db().await;
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), Arc::new(ScriptedBrain::always("x")));

    let sent = pipeline
        .dispatcher()
        .dispatch(DispatchRequest::new(
            "5215550013",
            OutboundContent::text("Tu pedido está listo"),
            Author::Operator(None),
        ))
        .await
        .unwrap();
    let wamid = sent.message.wa_message_id.clone().unwrap();

    let report = pipeline
        .ingestor()
        .ingest(&status_batch(json!([
            { "id": wamid, "status": "read", "timestamp": "1700000200", "recipient_id": "5215550013" },
            { "id": wamid, "status": "delivered", "timestamp": "1700000100", "recipient_id": "5215550013" },
            { "id": wamid, "status": "failed", "timestamp": "1700000300", "recipient_id": "5215550013" },
            { "id": "wamid.UNKNOWN", "status": "read", "timestamp": "1700000300" }
        ])))
        .await;

    assert_eq!(
        report.outcomes[0],
        NotificationOutcome::Status {
            result: StatusOutcome::Advanced {
                from: MessageStatus::Sent,
                to: MessageStatus::Read
            }
        }
    );
    assert_eq!(
        report.outcomes[1],
        NotificationOutcome::Status {
            result: StatusOutcome::Unchanged {
                current: MessageStatus::Read
            }
        }
    );
    assert!(matches!(report.outcomes[2], NotificationOutcome::Skipped { .. }));
    assert_eq!(
        report.outcomes[3],
        NotificationOutcome::Status {
            result: StatusOutcome::UnknownMessage
        }
    );

    let stored = message::get_message(db.pool(), sent.message.id).await.unwrap();
    assert_eq!(stored.status, MessageStatus::Read);
}

#[tokio::test]
async fn malformed_notification_does_not_block_siblings() {
    let db = test_db().await;
    let pipeline = pipeline(&db, Arc::new(RecordingChannel::new()), Arc::new(ScriptedBrain::always("x")));

    let report = pipeline
        .ingestor()
        .ingest(&batch(json!({
            "messages": [
                { "id": "wamid.BAD", "type": "text" },
                {
                    "from": "5215550014",
                    "id": "wamid.GOOD",
                    "timestamp": "1700000000",
                    "type": "image",
                    "image": { "id": "media-77", "mime_type": "image/jpeg" }
                }
            ]
        })))
        .await;

    assert!(matches!(report.outcomes[0], NotificationOutcome::Skipped { .. }));
    assert!(matches!(report.outcomes[1], NotificationOutcome::Stored { .. }));

    let conv = conversation::get_conversation_by_wa_id(db.pool(), "5215550014")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conv.last_message.as_deref(), Some("[image]"));
}

#[tokio::test]
async fn audio_reply_sent_as_voice_note() {
    let db = test_db().await;
    configure(&db, |s| s.audio_replies = true).await;

    let channel = Arc::new(RecordingChannel::new());
    let synthesizer = Arc::new(MockSynthesizer::returning(vec![0x4f, 0x67, 0x67, 0x53]));
    let pipeline = Pipeline::builder(db.clone(), channel.clone(), Arc::new(ScriptedBrain::always("Claro, te ayudo.")))
        .with_synthesizer(synthesizer.clone())
        .build();

    let report = pipeline.ingestor().ingest(&audio_batch("5215550015", "wamid.AUD1")).await;
    assert!(matches!(
        single_reply(&report),
        Some(ReplyOutcome::Sent { audio: true, .. })
    ));

    assert_eq!(channel.upload_count(), 1);
    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        &sent[0].content,
        OutboundContent::Media { kind: MediaKind::Audio, .. }
    ));
    assert_eq!(synthesizer.requests()[0].text, "Claro, te ayudo.");
}

#[tokio::test]
async fn audio_reply_stored_late_is_not_resent_as_text() {
    let db = test_db().await;
    configure(&db, |s| s.audio_replies = true).await;

    let recording = Arc::new(RecordingChannel::new());
    let channel = Arc::new(UnrecordableChannel {
        inner: recording.clone(),
        db: db.clone(),
    });
    let pipeline = Pipeline::builder(db.clone(), channel, Arc::new(ScriptedBrain::always("Claro, te ayudo.")))
        .with_synthesizer(Arc::new(MockSynthesizer::returning(vec![0x4f, 0x67, 0x67, 0x53])))
        .build();

    let report = pipeline.ingestor().ingest(&audio_batch("5215550016", "wamid.AUD2")).await;
    let conversation_id = match &report.outcomes[0] {
        NotificationOutcome::Stored { conversation_id, .. } => *conversation_id,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(
        single_reply(&report),
        Some(ReplyOutcome::Sent {
            message_id: None,
            wa_message_id: "wamid.OUT.1".to_string(),
            tokens_used: 10,
            audio: true,
        })
    );

    // One voice note, no text fallback.
    let sent = recording.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        &sent[0].content,
        OutboundContent::Media { kind: MediaKind::Audio, .. }
    ));

    let conv = conversation::get_conversation(db.pool(), conversation_id).await.unwrap();
    assert!(!conv.needs_human_attention);
    let logs = automation_log::list_logs(db.pool(), Some(conversation_id), 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].success);
}

#[tokio::test]
async fn text_reply_stored_late_is_not_escalated() {
    let db = test_db().await;
    configure(&db, |_| {}).await;

    let recording = Arc::new(RecordingChannel::new());
    let channel = Arc::new(UnrecordableChannel {
        inner: recording.clone(),
        db: db.clone(),
    });
    let pipeline = Pipeline::builder(db.clone(), channel, Arc::new(ScriptedBrain::always("¡Hola!"))).build();

    let report = pipeline
        .ingestor()
        .ingest(&text_batch("5215550017", "Eva", "wamid.TXT2", "hola"))
        .await;
    assert!(matches!(
        single_reply(&report),
        Some(ReplyOutcome::Sent { message_id: None, audio: false, .. })
    ));
    assert_eq!(recording.sent().len(), 1);

    let conv = conversation::get_conversation_by_wa_id(db.pool(), "5215550017")
        .await
        .unwrap()
        .unwrap();
    assert!(!conv.needs_human_attention);
}

#[tokio::test]
async fn failed_synthesis_degrades_to_text() {
    let db = test_db().await;
    configure(&db, |s| s.audio_replies = true).await;

    let channel = Arc::new(RecordingChannel::new());
    let pipeline = Pipeline::builder(db.clone(), channel.clone(), Arc::new(ScriptedBrain::always("Claro, te ayudo.")))
        .with_synthesizer(Arc::new(MockSynthesizer::failing()))
        .build();

    let report = pipeline.ingestor().ingest(&audio_batch("5215550016", "wamid.AUD2")).await;
    assert!(matches!(
        single_reply(&report),
        Some(ReplyOutcome::Sent { audio: false, .. })
    ));

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, OutboundContent::text("Claro, te ayudo."));

    let conv = conversation::get_conversation_by_wa_id(db.pool(), "5215550016")
        .await
        .unwrap()
        .unwrap();
    assert!(!conv.needs_human_attention);
}

#[tokio::test]
async fn inbound_audio_is_transcribed_before_generation() {
    let db = test_db().await;
    configure(&db, |_| {}).await;

    let channel = Arc::new(RecordingChannel::new().with_media(vec![1, 2, 3], "audio/ogg"));
    let transcriber = Arc::new(MockTranscriber::returning("¿cuánto cuesta el magnesio?"));
    let brain = Arc::new(ScriptedBrain::always("Cuesta $290."));
    let pipeline = Pipeline::builder(db.clone(), channel, brain.clone())
        .with_transcriber(transcriber.clone())
        .build();

    pipeline.ingestor().ingest(&audio_batch("5215550017", "wamid.AUD3")).await;

    assert_eq!(transcriber.call_count(), 1);
    let request = brain.last_request().unwrap();
    assert_eq!(request.message, "¿cuánto cuesta el magnesio?");
    assert!(request.instruction.contains(CATALOG));
}

#[tokio::test]
async fn generated_text_reaches_channel_and_store_unchanged() {
    let db = test_db().await;
    configure(&db, |_| {}).await;

    let channel = Arc::new(RecordingChannel::new());
    let pipeline = pipeline(&db, channel.clone(), Arc::new(EchoBrain::with_prefix("Recibido: ")));

    let report = pipeline
        .ingestor()
        .ingest(&text_batch("5215550019", "Leo", "wamid.ECHO1", "  ¿tienen magnesio?  "))
        .await;
    let message_id = match single_reply(&report) {
        Some(ReplyOutcome::Sent {
            message_id: Some(id),
            tokens_used: 3,
            ..
        }) => id,
        other => panic!("unexpected reply: {other:?}"),
    };

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content.body(), Some("Recibido: ¿tienen magnesio?"));

    let stored = message::get_message(db.pool(), message_id).await.unwrap();
    assert_eq!(stored.direction, Direction::Out);
    assert!(stored.automated);
    assert_eq!(stored.body.as_deref(), Some("Recibido: ¿tienen magnesio?"));
}

#[tokio::test]
async fn failed_transcription_escalates() {
    let db = test_db().await;
    configure(&db, |_| {}).await;

    let channel = Arc::new(RecordingChannel::new().with_media(vec![1, 2, 3], "audio/ogg"));
    let brain = Arc::new(ScriptedBrain::always("x"));
    let pipeline = Pipeline::builder(db.clone(), channel.clone(), brain.clone())
        .with_transcriber(Arc::new(MockTranscriber::failing()))
        .build();

    let report = pipeline.ingestor().ingest(&audio_batch("5215550018", "wamid.AUD4")).await;
    assert!(matches!(single_reply(&report), Some(ReplyOutcome::Escalated { .. })));
    assert_eq!(brain.call_count(), 0);
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn operator_send_to_new_contact_creates_conversation() {
    let db = test_db().await;
    let op = operator::create_operator(db.pool(), "ana", "Ana", "pw", 1)
        .await
        .unwrap();
    let channel = Arc::new(RecordingChannel::new());
    let pipeline = pipeline(&db, channel.clone(), Arc::new(ScriptedBrain::always("x")));

    let sent = pipeline
        .dispatcher()
        .dispatch(DispatchRequest::new(
            "5215550019",
            OutboundContent::text("Hola, te escribo de la tienda."),
            Author::Operator(Some(op.id)),
        ))
        .await
        .unwrap();

    assert!(sent.created_conversation);
    assert!(!sent.message.automated);
    assert_eq!(sent.message.operator_id, Some(op.id));

    // A later inbound from the same contact lands in the same conversation.
    let report = pipeline
        .ingestor()
        .ingest(&text_batch("5215550019", "Pedro", "wamid.BACK", "gracias"))
        .await;
    match &report.outcomes[0] {
        NotificationOutcome::Stored {
            conversation_id,
            created_conversation,
            ..
        } => {
            assert_eq!(*conversation_id, sent.conversation_id);
            assert!(!created_conversation);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
