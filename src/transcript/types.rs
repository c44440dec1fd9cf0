//! Normalized transcript types shared by every provider format
//!
//! All three normalizers produce `TranscriptMessage` values; the pairer,
//! paginator and cost annotation only ever see this shape.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::pricing::CostInfo;

/// Who emitted a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "transcript/")]
pub enum Role {
    User,
    Assistant,
}

/// A content block within a message
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "transcript/")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Reasoning trace
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[ts(type = "unknown")]
        input: Value,
        /// Set by the pairer once a later result references this call
        #[serde(default, skip_serializing_if = "is_false")]
        resolved: bool,
    },
    ToolResult {
        tool_use_id: String,
        #[ts(type = "unknown")]
        content: Value,
        #[serde(default)]
        is_error: bool,
        /// Copied from the originating call by the pairer
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn thinking(thinking: impl Into<String>) -> Self {
        ContentBlock::Thinking {
            thinking: thinking.into(),
        }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
            resolved: false,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: Value, is_error: bool) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content,
            is_error,
            tool_name: None,
        }
    }
}

/// Message content: either a plain string or an ordered list of blocks
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "transcript/")]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// True when the content carries nothing worth rendering
    pub fn is_blank(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.trim().is_empty(),
            MessageContent::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

pub const INPUT_TOKENS: &str = "input_tokens";
pub const OUTPUT_TOKENS: &str = "output_tokens";
pub const CACHED_INPUT_TOKENS: &str = "cached_input_tokens";
pub const REASONING_OUTPUT_TOKENS: &str = "reasoning_output_tokens";
pub const CACHE_CREATION_INPUT_TOKENS: &str = "cache_creation_input_tokens";
/// Claude's cache-read counter, disjoint from `input_tokens`
pub const CACHE_READ_INPUT_TOKENS: &str = "cache_read_input_tokens";

/// Token counts keyed by category name, plus an optional reported cost.
///
/// Merging two usages sums same-named keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Usage {
    #[serde(flatten)]
    pub tokens: BTreeMap<String, u64>,
    #[serde(rename = "costUSD", skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl Usage {
    pub fn get(&self, key: &str) -> u64 {
        self.tokens.get(key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: &str, value: u64) {
        self.tokens.insert(key.to_string(), value);
    }

    pub fn add(&mut self, key: &str, value: u64) {
        let count = self.tokens.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(value);
    }

    pub fn merge(&mut self, other: &Usage) {
        for (key, value) in &other.tokens {
            self.add(key, *value);
        }
        if let Some(cost) = other.cost_usd {
            self.cost_usd = Some(self.cost_usd.unwrap_or(0.0) + cost);
        }
    }

    /// Tokens processed, each counted once.
    ///
    /// `cached_input_tokens` is a subset of `input_tokens` and
    /// `reasoning_output_tokens` a subset of `output_tokens`.
    pub fn total_tokens(&self) -> u64 {
        self.tokens
            .iter()
            .filter(|(key, _)| {
                key.as_str() != CACHED_INPUT_TOKENS && key.as_str() != REASONING_OUTPUT_TOKENS
            })
            .fold(0u64, |sum, (_, value)| sum.saturating_add(*value))
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.cost_usd.is_none()
    }

    /// Build a usage map from a raw JSON object.
    ///
    /// Non-negative integer fields become token counts; `costUSD`/`cost`
    /// become the reported cost. Nested objects and strings are ignored.
    pub fn from_value(value: &Value) -> Option<Usage> {
        let object = value.as_object()?;
        let mut usage = Usage::default();
        for (key, field) in object {
            match key.as_str() {
                "costUSD" | "cost" => {
                    if let Some(cost) = field.as_f64().filter(|c| c.is_finite()) {
                        usage.cost_usd = Some(cost);
                    }
                }
                _ => {
                    if let Some(count) = field.as_u64() {
                        usage.set(key, count);
                    }
                }
            }
        }
        if usage.is_empty() {
            None
        } else {
            Some(usage)
        }
    }
}

/// Role, content, model and usage of one turn
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "transcript/")]
pub struct MessageBody {
    pub role: Role,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "Record<string, number> | null")]
    pub usage: Option<Usage>,
}

/// One turn in normalized form
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "transcript/")]
pub struct TranscriptMessage {
    #[serde(rename = "type")]
    pub kind: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub message: MessageBody,
    /// Attached by cost annotation, never by a normalizer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostInfo>,
}

impl TranscriptMessage {
    pub fn new(role: Role, content: MessageContent, timestamp: Option<String>) -> Self {
        Self {
            kind: role,
            timestamp,
            message: MessageBody {
                role,
                content,
                model: None,
                usage: None,
            },
            cost: None,
        }
    }

    pub fn text(role: Role, text: impl Into<String>, timestamp: Option<String>) -> Self {
        Self::new(role, MessageContent::Text(text.into()), timestamp)
    }

    pub fn blocks(role: Role, blocks: Vec<ContentBlock>, timestamp: Option<String>) -> Self {
        Self::new(role, MessageContent::Blocks(blocks), timestamp)
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.message.model = model;
        self
    }

    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.message.usage = usage;
        self
    }

    pub fn role(&self) -> Role {
        self.kind
    }

    /// Merge usage into this message, summing same-named keys
    pub fn absorb_usage(&mut self, usage: &Usage) {
        if usage.is_empty() {
            return;
        }
        match self.message.usage.as_mut() {
            Some(existing) => existing.merge(usage),
            None => self.message.usage = Some(usage.clone()),
        }
    }

    pub fn block_count(&self) -> usize {
        match &self.message.content {
            MessageContent::Blocks(blocks) => blocks.len(),
            MessageContent::Text(_) => 0,
        }
    }

    pub fn block(&self, index: usize) -> Option<&ContentBlock> {
        match &self.message.content {
            MessageContent::Blocks(blocks) => blocks.get(index),
            MessageContent::Text(_) => None,
        }
    }

    pub fn block_mut(&mut self, index: usize) -> Option<&mut ContentBlock> {
        match &mut self.message.content {
            MessageContent::Blocks(blocks) => blocks.get_mut(index),
            MessageContent::Text(_) => None,
        }
    }
}
