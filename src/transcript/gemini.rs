//! Gemini CLI transcripts
//!
//! Accepts both the chat-log shape (`{messages: [...]}` with `content`,
//! `toolCalls`, `thoughts`, `tokens`) and the checkpoint shape (top-level
//! array of `{role, parts}`). Gemini is best-effort: anything unreadable
//! yields an empty transcript.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::types::{
    ContentBlock, MessageContent, Role, TranscriptMessage, Usage, CACHED_INPUT_TOKENS,
    INPUT_TOKENS, OUTPUT_TOKENS, REASONING_OUTPUT_TOKENS,
};

/// Read and normalize a Gemini log file; failures yield an empty transcript
pub fn load(path: &Path) -> Vec<TranscriptMessage> {
    match fs::read_to_string(path) {
        Ok(text) => normalize(&text),
        Err(e) => {
            tracing::warn!("Failed to read Gemini log {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Normalize the full text of a Gemini log
pub fn normalize(text: &str) -> Vec<TranscriptMessage> {
    let root: Value = match serde_json::from_str(text) {
        Ok(root) => root,
        Err(e) => {
            tracing::warn!("Malformed Gemini log: {}", e);
            return Vec::new();
        }
    };
    let rows = match &root {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(obj) => match obj.get("messages").and_then(|m| m.as_array()) {
            Some(rows) => rows.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut ids = SyntheticIds::default();
    let mut current_model: Option<String> = None;
    let mut messages = Vec::new();

    for row in rows {
        if let Some(model) = row.get("model").and_then(|m| m.as_str()) {
            if !model.trim().is_empty() {
                current_model = Some(model.to_string());
            }
        }
        let Some(msg) = message_from_row(row, &mut ids) else {
            continue;
        };
        let msg = match msg.role() {
            Role::Assistant => msg
                .with_model(current_model.clone())
                .with_usage(usage_from_row(row)),
            Role::User => msg,
        };
        messages.push(msg);
    }

    messages
}

/// `name#n` ids for calls and responses that carry none
#[derive(Debug, Default)]
struct SyntheticIds {
    calls: HashMap<String, usize>,
    responses: HashMap<String, usize>,
}

impl SyntheticIds {
    fn next(counter: &mut HashMap<String, usize>, name: &str) -> String {
        let n = counter.entry(name.to_string()).or_insert(0);
        *n += 1;
        format!("{}#{}", name, n)
    }

    fn call(&mut self, name: &str) -> String {
        Self::next(&mut self.calls, name)
    }

    fn response(&mut self, name: &str) -> String {
        Self::next(&mut self.responses, name)
    }
}

fn role_of(row: &Value) -> Role {
    let role = row
        .get("type")
        .and_then(|v| v.as_str())
        .or_else(|| row.get("role").and_then(|v| v.as_str()));
    match role {
        Some("user") => Role::User,
        _ => Role::Assistant,
    }
}

fn message_from_row(row: &Value, ids: &mut SyntheticIds) -> Option<TranscriptMessage> {
    let role = role_of(row);
    let timestamp = row
        .get("timestamp")
        .and_then(|v| v.as_str())
        .map(String::from);

    let mut blocks = thought_blocks(row);
    let parts = row
        .get("parts")
        .and_then(|p| p.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut body: Vec<ContentBlock> = parts
        .iter()
        .filter_map(|part| block_from_part(part, ids))
        .collect();
    if body.is_empty() {
        let text = content_text(row.get("content"));
        if !text.trim().is_empty() {
            body.push(ContentBlock::text(text));
        }
    }
    if body.is_empty() {
        let leftover = leftover_parts(parts);
        if !leftover.trim().is_empty() {
            body.push(ContentBlock::text(leftover));
        }
    }
    blocks.extend(body);
    blocks.extend(tool_call_blocks(row));

    if blocks.is_empty() {
        return None;
    }
    let single_text = match blocks.as_slice() {
        [ContentBlock::Text { text }] => Some(text.clone()),
        _ => None,
    };
    let content = match single_text {
        Some(text) => MessageContent::Text(text),
        None => MessageContent::Blocks(blocks),
    };
    if content.is_blank() {
        return None;
    }
    Some(TranscriptMessage::new(role, content, timestamp))
}

fn block_from_part(part: &Value, ids: &mut SyntheticIds) -> Option<ContentBlock> {
    if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
        if text.trim().is_empty() {
            return None;
        }
        if part.get("thought").and_then(|t| t.as_bool()) == Some(true) {
            return Some(ContentBlock::thinking(text));
        }
        return Some(ContentBlock::text(text));
    }
    if let Some(call) = part.get("functionCall") {
        let name = call.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let id = match call.get("id").and_then(|i| i.as_str()) {
            Some(id) => id.to_string(),
            None => ids.call(name),
        };
        let input = call
            .get("args")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        return Some(ContentBlock::tool_use(id, name, input));
    }
    if let Some(response) = part.get("functionResponse") {
        let name = response.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let id = match response.get("id").and_then(|i| i.as_str()) {
            Some(id) => id.to_string(),
            None => ids.response(name),
        };
        let content = response.get("response").cloned().unwrap_or(Value::Null);
        let is_error = content.get("error").is_some();
        return Some(ContentBlock::tool_result(id, content, is_error));
    }
    None
}

/// Non-text parts we have no block for (inline data, executable code, ...)
fn leftover_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .filter(|part| {
            part.get("text").is_none()
                && part.get("functionCall").is_none()
                && part.get("functionResponse").is_none()
        })
        .map(|part| part.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                item.as_str()
                    .or_else(|| item.get("text").and_then(|t| t.as_str()))
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn thought_blocks(row: &Value) -> Vec<ContentBlock> {
    let Some(thoughts) = row.get("thoughts").and_then(|t| t.as_array()) else {
        return Vec::new();
    };
    thoughts
        .iter()
        .filter_map(|thought| {
            let subject = thought.get("subject").and_then(|s| s.as_str()).unwrap_or("");
            let description = thought
                .get("description")
                .and_then(|s| s.as_str())
                .unwrap_or("");
            let text = format!("{}\n{}", subject, description).trim().to_string();
            (!text.is_empty()).then(|| ContentBlock::thinking(text))
        })
        .collect()
}

fn tool_call_blocks(row: &Value) -> Vec<ContentBlock> {
    let Some(calls) = row.get("toolCalls").and_then(|t| t.as_array()) else {
        return Vec::new();
    };
    let mut blocks = Vec::with_capacity(calls.len() * 2);
    for (idx, call) in calls.iter().enumerate() {
        let name = call.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let id = call
            .get("id")
            .and_then(|i| i.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("{}#call{}", name, idx + 1));
        let input = call
            .get("args")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        blocks.push(ContentBlock::tool_use(id.clone(), name, input));

        if let Some(result) = call.get("result").filter(|r| !r.is_null()) {
            let is_error = call.get("status").and_then(|s| s.as_str()) == Some("error");
            blocks.push(ContentBlock::tool_result(
                id,
                Value::String(tool_output_text(result)),
                is_error,
            ));
        }
    }
    blocks
}

/// Flatten a tool result (often a list of `functionResponse` parts) to text
fn tool_output_text(result: &Value) -> String {
    match result {
        Value::String(text) => text.clone(),
        Value::Array(parts) => {
            let texts: Vec<String> = parts
                .iter()
                .filter_map(|part| {
                    let response = part.get("functionResponse")?.get("response")?;
                    match response.get("output").or_else(|| response.get("error")) {
                        Some(Value::String(text)) => Some(text.clone()),
                        Some(other) => Some(other.to_string()),
                        None => Some(response.to_string()),
                    }
                })
                .collect();
            if texts.is_empty() {
                result.to_string()
            } else {
                texts.join("\n")
            }
        }
        other => other.to_string(),
    }
}

/// `tokens` (chat logs) or `usageMetadata` (API responses); thoughts count as output
fn usage_from_row(row: &Value) -> Option<Usage> {
    let read = |obj: &Value, key: &str| obj.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
    let (input, output, cached, thoughts) = if let Some(tokens) = row.get("tokens") {
        (
            read(tokens, "input"),
            read(tokens, "output"),
            read(tokens, "cached"),
            read(tokens, "thoughts"),
        )
    } else if let Some(meta) = row.get("usageMetadata") {
        (
            read(meta, "promptTokenCount"),
            read(meta, "candidatesTokenCount"),
            read(meta, "cachedContentTokenCount"),
            read(meta, "thoughtsTokenCount"),
        )
    } else {
        return None;
    };

    if [input, output, cached, thoughts].iter().all(|count| *count == 0) {
        return None;
    }
    let mut usage = Usage::default();
    usage.set(INPUT_TOKENS, input);
    usage.set(OUTPUT_TOKENS, output.saturating_add(thoughts));
    usage.set(CACHED_INPUT_TOKENS, cached);
    if thoughts > 0 {
        usage.set(REASONING_OUTPUT_TOKENS, thoughts);
    }
    Some(usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::pairing::pair_tool_calls;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_malformed_input_yields_empty() {
        assert!(normalize("{not json").is_empty());
        assert!(normalize("42").is_empty());
        assert!(normalize("{\"sessionId\": \"abc\"}").is_empty());
        assert!(load(Path::new("/nonexistent/gemini/chat.json")).is_empty());
    }

    #[test]
    fn test_chat_log_shape() {
        let text = json!({
            "sessionId": "s1",
            "messages": [
                {"type": "user", "content": "fix the build", "timestamp": "2025-08-01T09:00:00Z"},
                {
                    "type": "gemini",
                    "content": "Looking now.",
                    "model": "gemini-2.5-pro",
                    "thoughts": [{"subject": "Plan", "description": "read Cargo.toml"}],
                    "tokens": {"input": 1000, "output": 50, "cached": 200, "thoughts": 30, "total": 1080},
                    "toolCalls": [{
                        "id": "read_file-1",
                        "name": "read_file",
                        "args": {"path": "Cargo.toml"},
                        "result": [{"functionResponse": {"id": "read_file-1", "name": "read_file",
                                     "response": {"output": "[package]"}}}],
                        "status": "success"
                    }]
                },
                {"type": "gemini", "content": "   "}
            ]
        })
        .to_string();

        let messages = normalize(&text);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].message.content,
            MessageContent::Text("fix the build".to_string())
        );

        let reply = &messages[1];
        assert_eq!(reply.role(), Role::Assistant);
        assert_eq!(reply.message.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(reply.block_count(), 4);
        assert!(matches!(reply.block(0), Some(ContentBlock::Thinking { .. })));
        assert!(matches!(
            reply.block(1),
            Some(ContentBlock::Text { text }) if text == "Looking now."
        ));
        match reply.block(3) {
            Some(ContentBlock::ToolResult { tool_use_id, content, is_error, .. }) => {
                assert_eq!(tool_use_id, "read_file-1");
                assert_eq!(content, &json!("[package]"));
                assert!(!is_error);
            }
            other => panic!("expected tool_result, got {:?}", other),
        }

        let usage = reply.message.usage.as_ref().unwrap();
        assert_eq!(usage.get(INPUT_TOKENS), 1000);
        assert_eq!(usage.get(OUTPUT_TOKENS), 80);
        assert_eq!(usage.get(CACHED_INPUT_TOKENS), 200);
        assert_eq!(usage.get(REASONING_OUTPUT_TOKENS), 30);
    }

    #[test]
    fn test_parts_shape_pairs_calls_without_ids() {
        let text = json!([
            {"role": "user", "parts": [{"text": "list files"}]},
            {"role": "model", "parts": [{"functionCall": {"name": "ls", "args": {"dir": "."}}}]},
            {"role": "user", "parts": [{"functionResponse": {"name": "ls", "response": {"output": "a b"}}}]},
            {"role": "model", "parts": [{"functionCall": {"name": "ls", "args": {"dir": "src"}}}]},
            {"role": "user", "parts": [{"functionResponse": {"name": "ls", "response": {"output": "lib.rs"}}}]}
        ])
        .to_string();

        let mut messages = normalize(&text);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[1].role(), Role::Assistant);
        assert_eq!(pair_tool_calls(&mut messages), 2);
        match messages[4].block(0) {
            Some(ContentBlock::ToolResult { tool_use_id, tool_name, .. }) => {
                assert_eq!(tool_use_id, "ls#2");
                assert_eq!(tool_name.as_deref(), Some("ls"));
            }
            other => panic!("expected tool_result, got {:?}", other),
        }
    }

    #[test]
    fn test_content_fallbacks() {
        let text = json!([
            {"role": "user", "content": ["part one", {"text": "part two"}]},
            {"role": "model", "parts": [{"inlineData": {"mimeType": "image/png"}}]},
            {"role": "model", "parts": [], "content": ""}
        ])
        .to_string();

        let messages = normalize(&text);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].message.content,
            MessageContent::Text("part one\npart two".to_string())
        );
        match &messages[1].message.content {
            MessageContent::Text(text) => assert!(text.contains("inlineData")),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_tool_call_marks_error() {
        let text = json!({"messages": [{
            "type": "gemini",
            "content": "",
            "toolCalls": [{"id": "t1", "name": "run_shell_command", "args": {},
                           "result": "exit 1", "status": "error"}]
        }]})
        .to_string();
        let messages = normalize(&text);
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0].block(1),
            Some(ContentBlock::ToolResult { is_error: true, .. })
        ));
    }

    #[test]
    fn test_usage_metadata_and_sticky_model() {
        let text = json!([
            {"role": "model", "model": "gemini-2.5-flash", "parts": [{"text": "a"}],
             "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4}},
            {"role": "model", "parts": [{"text": "b"}]}
        ])
        .to_string();
        let messages = normalize(&text);
        assert_eq!(messages[1].message.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(messages[0].message.usage.as_ref().unwrap().get(OUTPUT_TOKENS), 4);
        assert!(messages[1].message.usage.is_none());
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", json!({"messages": [{"type": "user", "content": "hi"}]})).unwrap();
        assert_eq!(load(file.path()).len(), 1);
        assert_eq!(load(file.path()), load(file.path()));
    }
}
