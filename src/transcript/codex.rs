//! OpenAI Codex CLI transcripts
//!
//! Codex logs are a sequence of tagged rows (`event_msg` and `response_item`
//! envelopes around a typed `payload`). Normalization is a left fold of
//! `CodexScan` over the rows; usage reconciliation turns the cumulative
//! `token_count` counters into per-turn deltas.

use serde_json::Value;
use std::fs;
use std::path::Path;

use super::types::{
    ContentBlock, Role, TranscriptMessage, Usage, CACHED_INPUT_TOKENS,
    CACHE_CREATION_INPUT_TOKENS, INPUT_TOKENS, OUTPUT_TOKENS, REASONING_OUTPUT_TOKENS,
};
use crate::error::AppError;

/// Token counters as reported by a `token_count` event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub total_tokens: u64,
}

impl TokenTotals {
    /// Read a `total_token_usage` / `last_token_usage` object
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| object.get(*key).and_then(|v| v.as_u64()))
                .unwrap_or(0)
        };
        Some(Self {
            input_tokens: field(&["input_tokens"]),
            output_tokens: field(&["output_tokens"]),
            reasoning_output_tokens: field(&["reasoning_output_tokens"]),
            cache_read_tokens: field(&["cached_input_tokens", "cache_read_input_tokens"]),
            cache_write_tokens: field(&["cache_creation_input_tokens"]),
            total_tokens: field(&["total_tokens"]),
        })
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Tokens this snapshot bills for
    pub fn sum(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_read_tokens)
            .saturating_add(self.cache_write_tokens)
    }

    fn plus(&self, other: &Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            reasoning_output_tokens: self
                .reasoning_output_tokens
                .saturating_add(other.reasoning_output_tokens),
            cache_read_tokens: self.cache_read_tokens.saturating_add(other.cache_read_tokens),
            cache_write_tokens: self.cache_write_tokens.saturating_add(other.cache_write_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }

    fn fields(&self) -> [i128; 6] {
        [
            self.input_tokens as i128,
            self.output_tokens as i128,
            self.reasoning_output_tokens as i128,
            self.cache_read_tokens as i128,
            self.cache_write_tokens as i128,
            self.total_tokens as i128,
        ]
    }

    /// Canonical usage keys for a per-turn delta
    pub fn to_usage(&self) -> Usage {
        let mut usage = Usage::default();
        usage.set(INPUT_TOKENS, self.input_tokens);
        usage.set(OUTPUT_TOKENS, self.output_tokens);
        usage.set(CACHED_INPUT_TOKENS, self.cache_read_tokens);
        if self.reasoning_output_tokens > 0 {
            usage.set(REASONING_OUTPUT_TOKENS, self.reasoning_output_tokens);
        }
        if self.cache_write_tokens > 0 {
            usage.set(CACHE_CREATION_INPUT_TOKENS, self.cache_write_tokens);
        }
        usage
    }
}

/// Derive the per-turn delta between two cumulative snapshots.
///
/// A negative difference in any counter means Codex restarted its counters;
/// the event's non-zero `last` snapshot then stands in for the delta.
/// Otherwise negative differences clamp to zero. Output is raised to
/// `total - input` when the reported output undercounts. Returns None when
/// the delta bills nothing.
pub fn reconcile(
    previous: &TokenTotals,
    current: &TokenTotals,
    last: Option<&TokenTotals>,
) -> Option<TokenTotals> {
    let prev = previous.fields();
    let cur = current.fields();
    let mut delta: [i128; 6] = std::array::from_fn(|i| cur[i] - prev[i]);

    let reset = delta.iter().any(|d| *d < 0);
    match last.filter(|l| !l.is_zero()) {
        Some(last) if reset => delta = last.fields(),
        _ => {
            for d in delta.iter_mut() {
                *d = (*d).max(0);
            }
        }
    }

    let [input, output, reasoning, cache_read, cache_write, total] = delta;
    let output = output.max(total - input).max(0);

    let result = TokenTotals {
        input_tokens: input as u64,
        output_tokens: output as u64,
        reasoning_output_tokens: reasoning as u64,
        cache_read_tokens: cache_read as u64,
        cache_write_tokens: cache_write as u64,
        total_tokens: total as u64,
    };
    if result.sum() == 0 {
        None
    } else {
        Some(result)
    }
}

/// Accumulator threaded through the row fold
#[derive(Debug, Default)]
struct CodexScan {
    current_model: Option<String>,
    previous_totals: TokenTotals,
    pending_usage: Usage,
    saw_event_conversation: bool,
    /// Emitted messages tagged with their source row
    messages: Vec<(usize, TranscriptMessage)>,
    /// `response_item/message` rows, used only if no event conversation exists
    fallback: Vec<(usize, TranscriptMessage)>,
    /// Latest assistant message since the last user message
    turn_assistant: Option<usize>,
    /// Reasoning texts already shown since the last user message
    turn_reasoning: Vec<String>,
}

impl CodexScan {
    fn step(mut self, row_idx: usize, row: &Value) -> Self {
        if let Some(model) = model_context(row) {
            self.current_model = Some(model.to_string());
        }

        let payload = row
            .get("payload")
            .filter(|p| p.is_object())
            .unwrap_or(row);
        let timestamp = row
            .get("timestamp")
            .or_else(|| payload.get("timestamp"))
            .and_then(|v| v.as_str())
            .map(String::from);
        let payload_type = payload.get("type").and_then(|v| v.as_str()).unwrap_or("");

        match payload_type {
            "user_message" => {
                self.saw_event_conversation = true;
                let text = str_field(payload, &["message", "text"]);
                if !text.trim().is_empty() {
                    self.messages
                        .push((row_idx, TranscriptMessage::text(Role::User, text, timestamp)));
                    self.turn_assistant = None;
                    self.turn_reasoning.clear();
                }
            }
            "agent_message" => {
                self.saw_event_conversation = true;
                let text = str_field(payload, &["message", "text"]);
                if !text.trim().is_empty() {
                    let msg = TranscriptMessage::text(Role::Assistant, text, timestamp);
                    self.push_assistant(row_idx, msg);
                }
            }
            "agent_reasoning" => {
                let text = str_field(payload, &["text", "message"]);
                self.push_thinking(row_idx, vec![text], timestamp);
            }
            "reasoning" => {
                self.push_thinking(row_idx, reasoning_parts(payload), timestamp);
            }
            "token_count" => self.apply_token_count(payload),
            "function_call" | "custom_tool_call" | "web_search_call" => {
                let block = tool_use_block(row_idx, payload_type, payload);
                let msg = TranscriptMessage::blocks(Role::Assistant, vec![block], timestamp);
                self.push_assistant(row_idx, msg);
            }
            "function_call_output" | "custom_tool_call_output" => {
                let call_id = str_field(payload, &["call_id", "id"]);
                let output = payload.get("output").unwrap_or(&Value::Null);
                let is_error = output.get("success").and_then(|v| v.as_bool()) == Some(false);
                let content = Value::String(output_text(output));
                let block = ContentBlock::tool_result(call_id, content, is_error);
                self.messages
                    .push((row_idx, TranscriptMessage::blocks(Role::User, vec![block], timestamp)));
            }
            "message" => {
                let role = match payload.get("role").and_then(|v| v.as_str()) {
                    Some("user") => Role::User,
                    Some("assistant") => Role::Assistant,
                    _ => return self,
                };
                let text = message_text(payload.get("content").unwrap_or(&Value::Null));
                if !text.trim().is_empty() {
                    let msg = TranscriptMessage::text(role, text, timestamp);
                    let msg = match role {
                        Role::Assistant => msg.with_model(self.current_model.clone()),
                        Role::User => msg,
                    };
                    self.fallback.push((row_idx, msg));
                }
            }
            _ => {}
        }

        self
    }

    fn push_assistant(&mut self, row_idx: usize, msg: TranscriptMessage) {
        let mut msg = msg.with_model(self.current_model.clone());
        let pending = std::mem::take(&mut self.pending_usage);
        msg.absorb_usage(&pending);
        self.messages.push((row_idx, msg));
        self.turn_assistant = Some(self.messages.len() - 1);
    }

    /// Emit reasoning not yet shown this turn.
    ///
    /// Codex logs each summary as an `agent_reasoning` event and again inside
    /// the `reasoning` response item; either may come first.
    fn push_thinking(&mut self, row_idx: usize, parts: Vec<String>, timestamp: Option<String>) {
        let fresh: Vec<String> = parts
            .into_iter()
            .filter(|part| !part.trim().is_empty() && !self.turn_reasoning.contains(part))
            .collect();
        if fresh.is_empty() {
            return;
        }
        self.turn_reasoning.extend(fresh.iter().cloned());
        let msg = TranscriptMessage::blocks(
            Role::Assistant,
            vec![ContentBlock::thinking(fresh.join("\n\n"))],
            timestamp,
        );
        self.push_assistant(row_idx, msg);
    }

    fn apply_token_count(&mut self, payload: &Value) {
        let Some(info) = payload.get("info").filter(|v| v.is_object()) else {
            return;
        };
        let current = info
            .get("total_token_usage")
            .and_then(TokenTotals::from_value);
        let last = info.get("last_token_usage").and_then(TokenTotals::from_value);

        let delta = match (current, last) {
            (Some(current), last) => {
                let delta = reconcile(&self.previous_totals, &current, last.as_ref());
                self.previous_totals = current;
                delta
            }
            (None, Some(last)) => {
                self.previous_totals = self.previous_totals.plus(&last);
                reconcile(&TokenTotals::default(), &last, None)
            }
            (None, None) => None,
        };

        let Some(delta) = delta else {
            return;
        };
        let usage = delta.to_usage();
        match self.turn_assistant {
            Some(idx) => self.messages[idx].1.absorb_usage(&usage),
            None => self.pending_usage.merge(&usage),
        }
    }

    fn finish(self) -> Vec<TranscriptMessage> {
        let mut rows = self.messages;
        if !self.saw_event_conversation && !self.fallback.is_empty() {
            rows.extend(self.fallback);
            rows.sort_by_key(|(row_idx, _)| *row_idx);
        }
        let mut messages: Vec<TranscriptMessage> = rows.into_iter().map(|(_, m)| m).collect();

        if !self.pending_usage.is_empty() {
            if let Some(last) = messages.iter_mut().rev().find(|m| m.role() == Role::Assistant) {
                last.absorb_usage(&self.pending_usage);
            }
        }
        messages
    }
}

/// Normalize parsed Codex rows into transcript messages
pub fn normalize(rows: &[Value]) -> Vec<TranscriptMessage> {
    rows.iter()
        .enumerate()
        .fold(CodexScan::default(), |scan, (idx, row)| scan.step(idx, row))
        .finish()
}

/// Parse a Codex JSON document (top-level array of rows)
pub fn parse_rows(text: &str) -> Result<Vec<Value>, AppError> {
    Ok(serde_json::from_str::<Vec<Value>>(text)?)
}

/// Parse a Codex JSONL rollout, skipping malformed lines
pub fn parse_rollout(text: &str) -> Vec<Value> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::debug!("Skipping malformed Codex line: {}", e);
                None
            }
        })
        .collect()
}

/// Load Codex rows from disk; `.jsonl` files are rollouts, anything else a JSON array
pub fn load_rows(path: &Path) -> Result<Vec<Value>, AppError> {
    if !path.exists() {
        return Err(AppError::file_not_found(path.display().to_string()));
    }
    let text = fs::read_to_string(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        Ok(parse_rollout(&text))
    } else {
        parse_rows(&text)
    }
}

fn model_context(row: &Value) -> Option<&str> {
    let payload = row.get("payload");
    [
        payload.and_then(|p| p.get("model")),
        payload.and_then(|p| p.get("info")).and_then(|i| i.get("model")),
        row.get("model"),
    ]
    .into_iter()
    .flatten()
    .find_map(|v| v.as_str())
    .filter(|m| !m.trim().is_empty())
}

fn str_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("")
        .to_string()
}

fn reasoning_parts(payload: &Value) -> Vec<String> {
    let collect = |key: &str| -> Vec<String> {
        payload
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        item.get("text")
                            .and_then(|t| t.as_str())
                            .or_else(|| item.as_str())
                    })
                    .filter(|t| !t.trim().is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    };
    let summary = collect("summary");
    if !summary.is_empty() {
        return summary;
    }
    collect("content")
}

fn message_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                item.get("text")
                    .and_then(|t| t.as_str())
                    .or_else(|| item.as_str())
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn tool_use_block(row_idx: usize, payload_type: &str, payload: &Value) -> ContentBlock {
    let id = ["call_id", "id"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(|v| v.as_str()))
        .map(String::from);

    if payload_type == "web_search_call" {
        let id = id.unwrap_or_else(|| format!("web_search-{}", row_idx));
        let input = payload
            .get("action")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        return ContentBlock::tool_use(id, "web_search", input);
    }

    let name = str_field(payload, &["name"]);
    let raw = match payload_type {
        "custom_tool_call" => payload.get("input"),
        _ => payload.get("arguments"),
    };
    let input = match raw {
        Some(Value::String(args)) => {
            serde_json::from_str(args).unwrap_or_else(|_| Value::String(args.clone()))
        }
        Some(other) => other.clone(),
        None => Value::Object(Default::default()),
    };
    ContentBlock::tool_use(id.unwrap_or_default(), name, input)
}

fn output_text(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
