//! Usage stats HTTP handlers

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::run_blocking;
use crate::api::AppState;
use crate::error::AppError;
use crate::pricing::annotate_costs;
use crate::pricing::summary::{summarize_usage, UsageSummary};
use crate::transcript::{self, pair_tool_calls};

/// Get per-model usage and cost for a whole session
pub async fn get_session_usage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UsageSummary>, AppError> {
    let summary = run_blocking(move || {
        let session = state
            .store
            .get(&id)
            .ok_or_else(|| AppError::session_not_found(id.clone()))?;
        let mut messages = transcript::load_transcript(&session)?;
        pair_tool_calls(&mut messages);
        let messages = annotate_costs(messages, &state.pricing);
        Ok(summarize_usage(&messages))
    })
    .await?;

    Ok(Json(summary))
}
