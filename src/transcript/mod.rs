//! Transcript normalization pipeline
//!
//! `detect_provider -> normalize -> pair_tool_calls -> paginate -> annotate_costs`.
//! Each stage is usable on its own; `load_page` composes them for one
//! request. Nothing is cached between calls.

pub mod claude;
pub mod codex;
pub mod gemini;
pub mod pagination;
pub mod pairing;
pub mod types;

pub use pagination::{paginate, Page, LAST_PAGE};
pub use pairing::{pair_tool_calls, pair_tool_calls_with, PageToolContext};
pub use types::{ContentBlock, MessageContent, Role, TranscriptMessage, Usage};

use std::fs;

use crate::error::AppError;
use crate::pricing::{annotate_costs, PricingTable};
use crate::providers::{detect_provider, ProviderKind};
use crate::sessions::SessionRecord;

/// Normalize raw transcript text for a provider.
///
/// Codex text starting with `[` is a JSON document and must parse; anything
/// else is read as a JSONL rollout. Claude and Gemini never fail here.
pub fn normalize(provider: ProviderKind, raw: &str) -> Result<Vec<TranscriptMessage>, AppError> {
    match provider {
        ProviderKind::Claude => Ok(claude::normalize(raw)),
        ProviderKind::Codex => {
            let rows = if raw.trim_start().starts_with('[') {
                codex::parse_rows(raw)?
            } else {
                codex::parse_rollout(raw)
            };
            Ok(codex::normalize(&rows))
        }
        ProviderKind::Gemini => Ok(gemini::normalize(raw)),
    }
}

/// Read and normalize a session's whole transcript
pub fn load_transcript(session: &SessionRecord) -> Result<Vec<TranscriptMessage>, AppError> {
    let path = session.jsonl_path.as_path();
    match detect_provider(session) {
        ProviderKind::Claude => {
            if !path.exists() {
                return Err(AppError::file_not_found(path.display().to_string()));
            }
            Ok(claude::normalize(&fs::read_to_string(path)?))
        }
        ProviderKind::Codex => Ok(codex::normalize(&codex::load_rows(path)?)),
        ProviderKind::Gemini => Ok(gemini::load(path)),
    }
}

/// Produce one annotated page of a session's transcript.
///
/// Claude transcripts are paged while streaming the file, and the pager pairs
/// tool calls across page boundaries itself. The other formats are single
/// JSON documents and are normalized and paired in full first.
pub fn load_page(
    session: &SessionRecord,
    page: i64,
    limit: usize,
    pricing: &PricingTable,
) -> Result<Page<TranscriptMessage>, AppError> {
    let provider = detect_provider(session);
    let result = match provider {
        ProviderKind::Claude => claude::read_page(&session.jsonl_path, page, limit)?,
        ProviderKind::Codex | ProviderKind::Gemini => {
            let mut messages = load_transcript(session)?;
            pair_tool_calls(&mut messages);
            paginate(messages, page, limit)
        }
    };

    tracing::debug!(
        session = %session.id,
        provider = %provider,
        page = result.page,
        total = result.total,
        "Loaded transcript page"
    );

    Ok(Page {
        messages: annotate_costs(result.messages, pricing),
        ..result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::pricing::DEFAULT_PRICING;
    use serde_json::json;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    fn session(id: &str, project_id: &str, path: &Path) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            provider: None,
            project_id: project_id.to_string(),
            jsonl_path: path.to_path_buf(),
            modified_at: None,
        }
    }

    fn codex_log() -> String {
        json!([
            {"type": "turn_context", "payload": {"model": "gpt-5"}},
            {"type": "event_msg", "payload": {"type": "user_message", "message": "run tests"}},
            {"type": "response_item", "payload": {"type": "function_call", "name": "shell",
                "call_id": "c1", "arguments": "{\"command\":[\"cargo\",\"test\"]}"}},
            {"type": "response_item", "payload": {"type": "function_call_output",
                "call_id": "c1", "output": "ok"}},
            {"type": "event_msg", "payload": {"type": "agent_message", "message": "All green."}},
            {"type": "event_msg", "payload": {"type": "token_count", "info": {
                "total_token_usage": {"input_tokens": 1000, "cached_input_tokens": 400,
                                      "output_tokens": 100, "total_tokens": 1100}}}}
        ])
        .to_string()
    }

    #[test]
    fn test_codex_pipeline_pairs_and_prices() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", codex_log()).unwrap();

        let page = load_page(
            &session("codex-x", "codex-sessions", file.path()),
            LAST_PAGE,
            200,
            &DEFAULT_PRICING,
        )
        .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.page, 1);
        assert!(matches!(
            page.messages[1].block(0),
            Some(ContentBlock::ToolUse { resolved: true, .. })
        ));

        let reply = &page.messages[3];
        let cost = reply.cost.as_ref().unwrap();
        assert_eq!(cost.confidence, crate::pricing::Confidence::Estimated);
        // 600 uncached input, 400 cached, 100 output on gpt-5
        let expected = (600.0 * 1.25 + 400.0 * 0.125 + 100.0 * 10.0) / 1_000_000.0;
        assert!((cost.usd.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_codex_malformed_document_errors() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "[{{broken").unwrap();
        let err = load_transcript(&session("codex-x", "codex-sessions", file.path())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
    }

    #[test]
    fn test_missing_files() {
        let missing = PathBuf::from("/nonexistent/transcript.jsonl");
        let err = load_page(&session("abc", "p", &missing), LAST_PAGE, 10, &DEFAULT_PRICING)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FileNotFound);

        let page = load_page(
            &session("gemini-x", "gemini-sessions", &missing),
            LAST_PAGE,
            10,
            &DEFAULT_PRICING,
        )
        .unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_claude_page_is_paired_and_annotated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let lines = [
            json!({"type": "user", "message": {"role": "user", "content": "read it"}}),
            json!({"type": "assistant", "message": {"role": "assistant", "model": "claude-sonnet-4-5-20250929",
                "content": [{"type": "tool_use", "id": "t1", "name": "Read", "input": {"file_path": "a"}}],
                "usage": {"input_tokens": 10, "output_tokens": 5, "cache_read_input_tokens": 100}}}),
            json!({"type": "user", "message": {"role": "user",
                "content": [{"type": "tool_result", "tool_use_id": "t1", "content": "data"}]}}),
        ];
        for line in &lines {
            writeln!(file, "{}", line).unwrap();
        }

        let page = load_page(&session("abc", "p", file.path()), LAST_PAGE, 200, &DEFAULT_PRICING)
            .unwrap();
        assert_eq!(page.total, 3);
        match page.messages[2].block(0) {
            Some(ContentBlock::ToolResult { tool_name, .. }) => {
                assert_eq!(tool_name.as_deref(), Some("Read"));
            }
            other => panic!("expected tool_result, got {:?}", other),
        }
        let cost = page.messages[1].cost.as_ref().unwrap();
        assert_eq!(cost.total_tokens, 115);
        assert!(cost.usd.unwrap() > 0.0);
    }

    #[test]
    fn test_normalize_dispatch() {
        let rollout = format!(
            "{}\n{}",
            json!({"type": "event_msg", "payload": {"type": "user_message", "message": "hi"}}),
            json!({"type": "event_msg", "payload": {"type": "agent_message", "message": "yo"}})
        );
        assert_eq!(normalize(ProviderKind::Codex, &rollout).unwrap().len(), 2);
        assert!(normalize(ProviderKind::Codex, "[oops").is_err());
        assert!(normalize(ProviderKind::Gemini, "[oops").unwrap().is_empty());
        assert_eq!(
            normalize(ProviderKind::Claude, "{\"type\":\"user\",\"message\":{\"content\":\"x\"}}")
                .unwrap()
                .len(),
            1
        );
    }
}
