//! Claude Code JSONL transcripts
//!
//! Each line is close to a `TranscriptMessage` already. Pages are read in a
//! single pass: every line is probed cheaply to count it, and only the lines
//! of the returned page are fully converted. At most two page-sized windows of
//! raw lines are held in memory.
//!
//! Tool calls are paired across page boundaries. The scan keeps the calls
//! still in flight before the page, and counts later results that answer calls
//! on the page, so only unanswered call ids are retained.

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::pagination::{total_pages, Page, LAST_PAGE};
use super::pairing::{pair_tool_calls_with, PageToolContext};
use super::types::{ContentBlock, MessageContent, Role, TranscriptMessage, Usage};
use crate::error::AppError;

/// Minimal view of a line, enough to decide whether it is a message
#[derive(Deserialize)]
struct LineProbe {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<ProbeMessage>,
}

#[derive(Deserialize)]
struct ProbeMessage {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Option<ProbeContent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProbeContent {
    Blocks(Vec<ProbeBlock>),
    Other(IgnoredAny),
}

#[derive(Deserialize)]
struct ProbeBlock {
    #[serde(rename = "type")]
    kind: Option<String>,
    id: Option<String>,
    name: Option<String>,
    tool_use_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum ToolEvent {
    Call { id: String, name: String },
    Result { id: String },
}

/// What the probe learned about a message line
struct Probe {
    role: Role,
    model: Option<String>,
    tools: Vec<ToolEvent>,
}

/// A counted line kept for later conversion
struct RawLine {
    line: String,
    role: Role,
    /// Model in effect at this line (own or inherited)
    model: Option<String>,
    tools: Vec<ToolEvent>,
}

/// Probe a line, or None if it is not a message
fn probe_line(line: &str) -> Option<Probe> {
    let probe: LineProbe = serde_json::from_str(line).ok()?;
    let role = match probe.kind.as_deref() {
        Some("user") => Role::User,
        Some("assistant") => Role::Assistant,
        _ => return None,
    };
    let message = probe.message?;
    let model = message.model.filter(|m| !m.trim().is_empty());
    let tools = match message.content {
        Some(ProbeContent::Blocks(blocks)) => blocks
            .into_iter()
            .filter_map(|block| match block.kind.as_deref() {
                Some("tool_use") => Some(ToolEvent::Call {
                    id: block.id.unwrap_or_default(),
                    name: block.name.unwrap_or_default(),
                }),
                Some("tool_result") => Some(ToolEvent::Result {
                    id: block.tool_use_id.unwrap_or_default(),
                }),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Some(Probe { role, model, tools })
}

/// Calls seen so far that no result has answered yet
#[derive(Debug, Clone, Default)]
struct InFlight(HashMap<String, Vec<String>>);

impl InFlight {
    fn observe(&mut self, events: &[ToolEvent]) {
        for event in events {
            match event {
                ToolEvent::Call { id, name } => {
                    self.0.entry(id.clone()).or_default().push(name.clone());
                }
                ToolEvent::Result { id } => {
                    self.answer(id);
                }
            }
        }
    }

    /// Drop the newest open call with this id
    fn answer(&mut self, id: &str) -> bool {
        let Some(names) = self.0.get_mut(id) else {
            return false;
        };
        names.pop();
        if names.is_empty() {
            self.0.remove(id);
        }
        true
    }
}

/// Results after the page that answer calls left open on it
#[derive(Debug, Default)]
struct LaterResults {
    open: InFlight,
    /// Open-id calls made after the page that have no result yet
    later_calls: HashMap<String, usize>,
    answered: HashMap<String, usize>,
}

impl LaterResults {
    fn new(page: &[RawLine]) -> Self {
        let mut open = InFlight::default();
        for raw in page {
            open.observe(&raw.tools);
        }
        Self {
            open,
            ..Default::default()
        }
    }

    fn observe(&mut self, events: &[ToolEvent]) {
        for event in events {
            match event {
                ToolEvent::Call { id, .. } if self.open.0.contains_key(id) => {
                    *self.later_calls.entry(id.clone()).or_default() += 1;
                }
                ToolEvent::Call { .. } => {}
                ToolEvent::Result { id } => {
                    if let Some(calls) = self.later_calls.get_mut(id).filter(|n| **n > 0) {
                        *calls -= 1;
                    } else if self.open.answer(id) {
                        *self.answered.entry(id.clone()).or_default() += 1;
                    }
                }
            }
        }
    }
}

/// Read one page of a Claude JSONL transcript from disk
pub fn read_page(
    path: &Path,
    page: i64,
    limit: usize,
) -> Result<Page<TranscriptMessage>, AppError> {
    if !path.exists() {
        return Err(AppError::file_not_found(path.display().to_string()));
    }
    let file = File::open(path)?;
    page_from_reader(BufReader::new(file), page, limit)
}

/// Single-pass page read over any line source, with tool calls paired
pub fn page_from_reader<R: BufRead>(
    reader: R,
    page: i64,
    limit: usize,
) -> Result<Page<TranscriptMessage>, AppError> {
    let limit = limit.max(1);
    let target = match page {
        LAST_PAGE => None,
        p if p < 1 => Some(1usize),
        p => Some(p as usize),
    };
    let window_start = target.map(|p| (p - 1).saturating_mul(limit));

    let mut total = 0usize;
    let mut skipped = 0usize;
    let mut last_model: Option<String> = None;
    let mut window: Vec<RawLine> = Vec::new();
    // Lines of the newest page-aligned chunk; becomes the last page at EOF
    let mut tail: Vec<RawLine> = Vec::new();
    // Open calls before the tail chunk and before the requested window
    let mut before_tail = InFlight::default();
    let mut before_window: Option<InFlight> = None;
    let mut after_window: Option<LaterResults> = None;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(probe) = probe_line(&line) else {
            skipped += 1;
            continue;
        };
        if probe.model.is_some() {
            last_model = probe.model;
        }

        let index = total;
        total += 1;
        let raw = RawLine {
            line,
            role: probe.role,
            model: last_model.clone(),
            tools: probe.tools,
        };

        if let Some(start) = window_start {
            if index >= start && index - start < limit {
                if window.is_empty() {
                    let mut carried = before_tail.clone();
                    for earlier in &tail {
                        carried.observe(&earlier.tools);
                    }
                    before_window = Some(carried);
                }
                window.push(raw);
                continue;
            }
            if index >= start {
                after_window
                    .get_or_insert_with(|| LaterResults::new(&window))
                    .observe(&raw.tools);
                continue;
            }
        }
        if window.is_empty() {
            if tail.len() == limit {
                for earlier in tail.drain(..) {
                    before_tail.observe(&earlier.tools);
                }
            }
            tail.push(raw);
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, total, "skipped non-message lines in JSONL transcript");
    }

    let total_pages = total_pages(total, limit);
    let (page, raws, context) = match target {
        Some(p) if !window.is_empty() => {
            let context = PageToolContext {
                carried: before_window.unwrap_or_default().0,
                answered_later: after_window.map(|later| later.answered).unwrap_or_default(),
            };
            (p, window, context)
        }
        _ => {
            let context = PageToolContext {
                carried: before_tail.0,
                ..Default::default()
            };
            (total_pages, tail, context)
        }
    };

    let mut messages: Vec<TranscriptMessage> = raws
        .into_iter()
        .filter_map(|raw| {
            let record: Value = serde_json::from_str(&raw.line).ok()?;
            Some(message_from_record(&record, raw.role, raw.model))
        })
        .collect();
    pair_tool_calls_with(&mut messages, &context);

    Ok(Page {
        messages,
        total,
        page,
        total_pages,
    })
}

/// Convert a whole JSONL transcript held in memory
pub fn normalize(text: &str) -> Vec<TranscriptMessage> {
    let mut last_model: Option<String> = None;
    let mut messages = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(probe) = probe_line(line) else {
            continue;
        };
        if probe.model.is_some() {
            last_model = probe.model;
        }
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        messages.push(message_from_record(&record, probe.role, last_model.clone()));
    }

    messages
}

fn message_from_record(record: &Value, role: Role, model: Option<String>) -> TranscriptMessage {
    let message = record.get("message").unwrap_or(&Value::Null);
    let content = message
        .get("content")
        .map(content_from_value)
        .unwrap_or_else(|| MessageContent::Text(String::new()));
    let timestamp = record
        .get("timestamp")
        .and_then(|v| v.as_str())
        .map(String::from);

    let mut usage = message.get("usage").and_then(Usage::from_value);
    if let Some(cost) = record.get("costUSD").and_then(|v| v.as_f64()) {
        let usage = usage.get_or_insert_with(Usage::default);
        if usage.cost_usd.is_none() {
            usage.cost_usd = Some(cost);
        }
    }

    let model = match role {
        Role::Assistant => model,
        Role::User => message
            .get("model")
            .and_then(|v| v.as_str())
            .map(String::from),
    };

    TranscriptMessage::new(role, content, timestamp)
        .with_model(model)
        .with_usage(usage)
}

/// Map Claude message content (string or block array) onto `MessageContent`
pub fn content_from_value(value: &Value) -> MessageContent {
    match value {
        Value::String(text) => MessageContent::Text(text.clone()),
        Value::Array(items) => {
            MessageContent::Blocks(items.iter().filter_map(block_from_value).collect())
        }
        _ => MessageContent::Text(String::new()),
    }
}

fn block_from_value(item: &Value) -> Option<ContentBlock> {
    if let Some(text) = item.as_str() {
        return Some(ContentBlock::text(text));
    }
    let str_field = |key: &str| item.get(key).and_then(|v| v.as_str()).unwrap_or("");

    match item.get("type").and_then(|t| t.as_str())? {
        "text" => Some(ContentBlock::text(str_field("text"))),
        "thinking" => Some(ContentBlock::thinking(str_field("thinking"))),
        "tool_use" => Some(ContentBlock::tool_use(
            str_field("id"),
            str_field("name"),
            item.get("input").cloned().unwrap_or_else(|| Value::Object(Default::default())),
        )),
        "tool_result" => Some(ContentBlock::tool_result(
            str_field("tool_use_id"),
            item.get("content").cloned().unwrap_or(Value::String(String::new())),
            item.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false),
        )),
        // images, redacted thinking and friends are not rendered
        _ => None,
    }
}
