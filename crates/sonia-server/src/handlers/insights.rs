//! Dashboard, wellness path and report handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::{extract::State, Json};
use sonia_core::analytics::{self, PointSource, MILESTONES};
use sonia_core::WellnessReport;
use tracing::info;

use crate::auth::AuthUser;
use crate::dto::{DashboardResponse, ReportRequest, ReportScope, WellnessResponse};
use crate::error::AppError;
use crate::ServerState;

/// Fewest data points a report is generated from.
pub const MIN_REPORT_POINTS: usize = 2;

/// GET /api/dashboard - Chat-only analytics.
pub async fn dashboard(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let messages = state.store.list_messages(&user.id)?;
    let timeline: Vec<_> = analytics::timeline(&messages, &[])
        .into_iter()
        .filter(|p| p.source == PointSource::Chat)
        .collect();

    Ok(Json(DashboardResponse {
        distribution: analytics::distribution(&messages),
        tracked_emotions: timeline.len(),
        total_messages: messages.len(),
        summary: analytics::summarize(&timeline),
        timeline,
    }))
}

/// GET /api/wellness - Combined chat and journal analytics.
pub async fn wellness(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<WellnessResponse>, AppError> {
    let messages = state.store.list_messages(&user.id)?;
    let entries = state.store.list_journal_entries(&user.id)?;
    let timeline = analytics::timeline(&messages, &entries);

    Ok(Json(WellnessResponse {
        progress: analytics::path_progress(&timeline),
        milestones: MILESTONES.to_vec(),
        history: analytics::history_by_day(&timeline),
        summary: analytics::summarize(&timeline),
        timeline,
    }))
}

/// POST /api/report - Asks the model for a narrative summary.
pub async fn report(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> Result<Json<WellnessReport>, AppError> {
    // The body is optional; an empty one means the chat-only report.
    let req: ReportRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ReportRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::bad_request(format!("Invalid report request: {e}")))?
    };
    let messages = state.store.list_messages(&user.id)?;
    let entries = match req.scope {
        ReportScope::Chat => Vec::new(),
        ReportScope::All => state.store.list_journal_entries(&user.id)?,
    };
    if messages.len() + entries.len() < MIN_REPORT_POINTS {
        return Err(AppError::bad_request("Not enough data"));
    }

    let context = state.store.get_context(&user.id)?;
    let report = state
        .model
        .generate_summary_report(&entries, &messages, &context)
        .await?
        .ok_or_else(|| AppError::Upstream("report output did not match the schema".into()))?;

    info!(user = %user.id, scope = ?req.scope, stability = report.stability_score, "Report generated");
    Ok(Json(report))
}
