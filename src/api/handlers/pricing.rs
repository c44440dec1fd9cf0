//! Ad-hoc price estimate handler

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::error::AppError;
use crate::pricing::{Estimate, TokenCounts};

/// Estimate query params
#[derive(Debug, Deserialize)]
pub struct EstimateQuery {
    model: Option<String>,
    #[serde(default)]
    input: u64,
    #[serde(default)]
    output: u64,
    #[serde(default, alias = "cacheRead")]
    cache_read: u64,
    #[serde(default, alias = "cacheWrite")]
    cache_write: u64,
}

/// Price raw token counts for a model
pub async fn estimate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EstimateQuery>,
) -> Result<Json<Estimate>, AppError> {
    let model = query
        .model
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::invalid_params("model is required"))?;

    let tokens = TokenCounts {
        input: query.input,
        output: query.output,
        cache_read: query.cache_read,
        cache_write: query.cache_write,
        reasoning: 0,
    };
    Ok(Json(state.pricing.estimate(&model, &tokens)))
}
