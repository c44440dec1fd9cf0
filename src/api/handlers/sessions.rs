//! Session listing and transcript paging handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ts_rs::TS;

use super::run_blocking;
use crate::api::AppState;
use crate::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::error::AppError;
use crate::providers::{detect_provider, supported_providers, ProviderKind};
use crate::sessions::SessionRecord;
use crate::transcript::{self, TranscriptMessage, LAST_PAGE};

/// Messages query params. Kept as strings so bad values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    page: Option<String>,
    limit: Option<String>,
}

/// One page of a transcript as sent to the frontend
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "api/")]
pub struct MessagesResponse {
    pub messages: Vec<TranscriptMessage>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    /// Earlier pages exist
    pub has_more: bool,
}

/// Requested page; missing or unparseable means the last page
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse().ok()).unwrap_or(LAST_PAGE)
}

/// Requested page size clamped to `[1, MAX_PAGE_LIMIT]`
pub fn parse_limit(raw: Option<&str>) -> usize {
    match raw.and_then(|l| l.trim().parse::<i64>().ok()) {
        Some(limit) => limit.clamp(1, MAX_PAGE_LIMIT as i64) as usize,
        None => DEFAULT_PAGE_LIMIT,
    }
}

/// Get one page of a session's messages
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, AppError> {
    let page = parse_page(query.page.as_deref());
    let limit = parse_limit(query.limit.as_deref());

    let result = run_blocking(move || {
        let session = state
            .store
            .get(&id)
            .ok_or_else(|| AppError::session_not_found(id.clone()))?;
        transcript::load_page(&session, page, limit, &state.pricing)
    })
    .await?;

    Ok(Json(MessagesResponse {
        has_more: result.page > 1,
        messages: result.messages,
        total: result.total,
        page: result.page,
        page_size: limit,
        total_pages: result.total_pages,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsQuery {
    provider: Option<String>,
}

/// List sessions, newest first, with the detected provider filled in
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<SessionRecord>>, AppError> {
    let filter = match query.provider.as_deref() {
        Some(name) => Some(
            ProviderKind::from_name(name).ok_or_else(|| {
                AppError::invalid_params(format!(
                    "Unknown provider: {} (expected one of {})",
                    name,
                    supported_providers().join(", ")
                ))
            })?,
        ),
        None => None,
    };

    let sessions = run_blocking(move || Ok(state.store.list())).await?;
    let sessions = sessions
        .into_iter()
        .filter_map(|record| {
            let kind = detect_provider(&record);
            if filter.is_some_and(|f| f != kind) {
                return None;
            }
            Some(SessionRecord {
                provider: Some(kind.to_string()),
                ..record
            })
        })
        .collect();

    Ok(Json(sessions))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    fn claude_lines(count: usize) -> String {
        (0..count)
            .map(|i| {
                json!({"type": "user", "message": {"role": "user", "content": format!("m{}", i)}})
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_query_parsing() {
        assert_eq!(parse_page(None), LAST_PAGE);
        assert_eq!(parse_page(Some("abc")), LAST_PAGE);
        assert_eq!(parse_page(Some("3")), 3);
        assert_eq!(parse_limit(None), DEFAULT_PAGE_LIMIT);
        assert_eq!(parse_limit(Some("0")), 1);
        assert_eq!(parse_limit(Some("-5")), 1);
        assert_eq!(parse_limit(Some("10000")), MAX_PAGE_LIMIT);
        assert_eq!(parse_limit(Some("x")), DEFAULT_PAGE_LIMIT);
    }

    #[tokio::test]
    async fn test_default_view_is_last_page() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "claude/proj/s1.jsonl", &claude_lines(450));

        let (status, body) =
            get_json(app_for(root.path()), "/api/sessions/s1/messages").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 450);
        assert_eq!(body["page"], 3);
        assert_eq!(body["pageSize"], 200);
        assert_eq!(body["totalPages"], 3);
        assert_eq!(body["hasMore"], true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 50);
        assert_eq!(body["messages"][0]["message"]["content"], "m400");
        assert_eq!(body["messages"][0]["cost"]["confidence"], "none");
    }

    #[tokio::test]
    async fn test_first_page_has_no_more() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "claude/proj/s1.jsonl", &claude_lines(10));

        let (_, body) = get_json(
            app_for(root.path()),
            "/api/sessions/s1/messages?page=1&limit=4",
        )
        .await;
        assert_eq!(body["page"], 1);
        assert_eq!(body["hasMore"], false);
        assert_eq!(body["totalPages"], 3);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let root = tempfile::tempdir().unwrap();
        let (status, body) =
            get_json(app_for(root.path()), "/api/sessions/nope/messages").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_codex_is_generic_500() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "codex/broken.json", "[{\"type\": ");

        let (status, body) =
            get_json(app_for(root.path()), "/api/sessions/codex-broken/messages").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to read session file"}));
    }

    #[tokio::test]
    async fn test_malformed_gemini_is_empty_page() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "gemini/abc/chats/session-9.json", "{oops");

        let (status, body) =
            get_json(app_for(root.path()), "/api/sessions/gemini-session-9/messages").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        assert_eq!(body["page"], 1);
        assert_eq!(body["hasMore"], false);
    }

    #[tokio::test]
    async fn test_list_sessions_with_filter() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "claude/proj/s1.jsonl", &claude_lines(1));
        write(root.path(), "codex/rollout-1.jsonl", "");

        let (status, body) = get_json(app_for(root.path()), "/api/sessions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, body) = get_json(app_for(root.path()), "/api/sessions?provider=codex").await;
        let sessions = body.as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["id"], "codex-rollout-1");
        assert_eq!(sessions[0]["provider"], "codex");

        let (status, body) = get_json(app_for(root.path()), "/api/sessions?provider=bard").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Unknown provider: bard (expected one of claude, codex, gemini)"
        );
    }
}
