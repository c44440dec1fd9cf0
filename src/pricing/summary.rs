//! Per-model usage totals for a whole session

use serde::Serialize;
use std::collections::BTreeMap;
use ts_rs::TS;

use super::{Confidence, TokenCounts};
use crate::transcript::types::TranscriptMessage;

#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "pricing/")]
pub struct ModelUsage {
    pub model: String,
    #[ts(type = "number")]
    pub input_tokens: u64,
    #[ts(type = "number")]
    pub output_tokens: u64,
    #[ts(type = "number")]
    pub cache_read_tokens: u64,
    #[ts(type = "number")]
    pub cache_write_tokens: u64,
    #[ts(type = "number")]
    pub total_tokens: u64,
    pub usd: f64,
    pub message_count: usize,
}

impl ModelUsage {
    fn add(&mut self, tokens: &TokenCounts, usd: f64) {
        self.input_tokens = self.input_tokens.saturating_add(tokens.input);
        self.output_tokens = self.output_tokens.saturating_add(tokens.output);
        self.cache_read_tokens = self.cache_read_tokens.saturating_add(tokens.cache_read);
        self.cache_write_tokens = self.cache_write_tokens.saturating_add(tokens.cache_write);
        self.total_tokens = self.total_tokens.saturating_add(tokens.total());
        self.usd += usd;
        self.message_count += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "pricing/")]
pub struct UsageSummary {
    pub models: Vec<ModelUsage>,
    pub totals: ModelUsage,
    /// Messages with tokens that could not be priced
    pub unpriced_messages: usize,
}

/// Aggregate annotated messages by model, most expensive first.
///
/// Messages without usage are skipped; usage without a model is grouped
/// under "unknown".
pub fn summarize_usage(messages: &[TranscriptMessage]) -> UsageSummary {
    let mut by_model: BTreeMap<String, ModelUsage> = BTreeMap::new();
    let mut totals = ModelUsage {
        model: "total".to_string(),
        ..Default::default()
    };
    let mut unpriced_messages = 0;

    for message in messages {
        let Some(usage) = message.message.usage.as_ref() else {
            continue;
        };
        let tokens = TokenCounts::from_usage(usage);
        let usd = message.cost.as_ref().and_then(|c| c.usd).unwrap_or(0.0);
        if matches!(
            message.cost.as_ref().map(|c| c.confidence),
            Some(Confidence::Unpriced)
        ) {
            unpriced_messages += 1;
        }

        let model = message
            .message
            .model
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        by_model
            .entry(model.clone())
            .or_insert_with(|| ModelUsage {
                model,
                ..Default::default()
            })
            .add(&tokens, usd);
        totals.add(&tokens, usd);
    }

    let mut models: Vec<ModelUsage> = by_model.into_values().collect();
    models.sort_by(|a, b| b.usd.total_cmp(&a.usd));

    UsageSummary {
        models,
        totals,
        unpriced_messages,
    }
}
