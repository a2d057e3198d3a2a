//! Conversation routes: listing, single-field transitions, and manual passes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use database::{conversation, operator, Conversation, ConversationFilter, ConversationFlag, OrderStatus};
use orchestrator::{AnalysisReport, DispatchedMessage};
use serde::Deserialize;
use tracing::info;

use crate::error::Result;
use crate::state::AppState;

/// Body of boolean flag transitions.
#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    pub value: bool,
}

/// Body of the automation toggle.
#[derive(Debug, Deserialize)]
pub struct AutomationRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    pub label_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub order_status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssigneeRequest {
    pub operator_id: Option<i64>,
}

/// List conversations, pinned first.
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ConversationFilter>,
) -> Result<Json<Vec<Conversation>>> {
    let conversations = conversation::list_conversations(state.db.pool(), &filter).await?;
    Ok(Json(conversations))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Conversation>> {
    let conv = conversation::get_conversation(state.db.pool(), id).await?;
    Ok(Json(conv))
}

/// Delete a conversation and its messages.
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    conversation::delete_conversation(state.db.pool(), id).await?;
    info!(conversation_id = id, "Conversation deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_pinned(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<FlagRequest>,
) -> Result<Json<Conversation>> {
    set_flag(&state, id, ConversationFlag::Pinned, req.value).await
}

/// Opt a conversation in or out of automated replies.
pub async fn set_automation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AutomationRequest>,
) -> Result<Json<Conversation>> {
    set_flag(&state, id, ConversationFlag::AutomationDisabled, !req.enabled).await
}

pub async fn set_should_call(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<FlagRequest>,
) -> Result<Json<Conversation>> {
    set_flag(&state, id, ConversationFlag::ShouldCall, req.value).await
}

/// Mark a conversation as handled by a human.
pub async fn clear_attention(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Conversation>> {
    set_flag(&state, id, ConversationFlag::NeedsHumanAttention, false).await
}

pub async fn set_label(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<LabelRequest>,
) -> Result<Json<Conversation>> {
    conversation::set_label(state.db.pool(), id, req.label_id).await?;
    Ok(Json(conversation::get_conversation(state.db.pool(), id).await?))
}

pub async fn set_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<OrderStatusRequest>,
) -> Result<Json<Conversation>> {
    conversation::set_order_status(state.db.pool(), id, req.order_status).await?;
    Ok(Json(conversation::get_conversation(state.db.pool(), id).await?))
}

/// Reassign a conversation; `null` unassigns it.
pub async fn set_assignee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AssigneeRequest>,
) -> Result<Json<Conversation>> {
    let pool = state.db.pool();
    if let Some(operator_id) = req.operator_id {
        operator::get_operator(pool, operator_id).await?;
    }

    conversation::assign_operator(pool, id, req.operator_id).await?;
    info!(conversation_id = id, operator_id = ?req.operator_id, "Conversation reassigned");
    Ok(Json(conversation::get_conversation(pool, id).await?))
}

/// Run the analysis pass on demand.
pub async fn analyze(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AnalysisReport>> {
    let report = state.pipeline.analyst().analyze(id).await?;
    Ok(Json(report))
}

/// Send a follow-up message on demand.
pub async fn follow_up(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DispatchedMessage>> {
    let sent = state.pipeline.analyst().follow_up(id).await?;
    Ok(Json(sent))
}

async fn set_flag(
    state: &AppState,
    id: i64,
    flag: ConversationFlag,
    value: bool,
) -> Result<Json<Conversation>> {
    conversation::set_flag(state.db.pool(), id, flag, value).await?;
    Ok(Json(conversation::get_conversation(state.db.pool(), id).await?))
}
