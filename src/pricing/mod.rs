//! Model pricing and cost estimation
//!
//! Rates are USD per million tokens. The built-in table covers the Claude,
//! OpenAI and Gemini models the dashboard sees; the config file may add or
//! replace entries.

mod annotate;
pub mod summary;

pub use annotate::{annotate_costs, cost_for_message, Confidence, CostInfo, PricingStatus};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::constants::{
    MODEL_PREFIXES, RE_MODEL_CONTEXT_SUFFIX, RE_MODEL_DATE_SUFFIX, RE_MODEL_VERSION_SUFFIX,
};
use crate::transcript::types::{
    Usage, CACHED_INPUT_TOKENS, CACHE_CREATION_INPUT_TOKENS, CACHE_READ_INPUT_TOKENS,
    INPUT_TOKENS, OUTPUT_TOKENS, REASONING_OUTPUT_TOKENS,
};

const PER_MILLION: f64 = 1_000_000.0;

/// Per-million-token rates for the categories a model bills
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    #[serde(default)]
    pub input: Option<f64>,
    #[serde(default)]
    pub output: Option<f64>,
    #[serde(default)]
    pub cache_read: Option<f64>,
    #[serde(default)]
    pub cache_write: Option<f64>,
    /// Only set for models that bill reasoning apart from output
    #[serde(default)]
    pub reasoning: Option<f64>,
}

impl ModelRates {
    fn new(input: f64, output: f64, cache_write: Option<f64>, cache_read: f64) -> Self {
        Self {
            input: Some(input),
            output: Some(output),
            cache_read: Some(cache_read),
            cache_write,
            reasoning: None,
        }
    }
}

/// Disjoint token counts ready for pricing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCounts {
    /// Uncached input
    pub input: u64,
    /// Output including reasoning
    pub output: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub reasoning: u64,
}

impl TokenCounts {
    /// Map a usage record onto pricing categories.
    ///
    /// OpenAI and Gemini report cached tokens inside `input_tokens`; they are
    /// moved out so every token is billed once. Claude's
    /// `cache_read_input_tokens` is already disjoint.
    pub fn from_usage(usage: &Usage) -> Self {
        let cached = usage.get(CACHED_INPUT_TOKENS);
        Self {
            input: usage.get(INPUT_TOKENS).saturating_sub(cached),
            output: usage.get(OUTPUT_TOKENS),
            cache_read: cached.saturating_add(usage.get(CACHE_READ_INPUT_TOKENS)),
            cache_write: usage.get(CACHE_CREATION_INPUT_TOKENS),
            reasoning: usage.get(REASONING_OUTPUT_TOKENS),
        }
    }

    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.cache_read)
            .saturating_add(self.cache_write)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "pricing/")]
pub enum EstimateStatus {
    Priced,
    Unpriced,
}

/// Why a cost could not be estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "pricing/")]
pub enum UnpricedReason {
    ModelNotFound,
    MissingRateFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "pricing/")]
pub struct Estimate {
    pub status: EstimateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnpricedReason>,
}

impl Estimate {
    fn priced(cost: f64) -> Self {
        Self {
            status: EstimateStatus::Priced,
            cost: Some(cost),
            reason: None,
        }
    }

    fn unpriced(reason: UnpricedReason) -> Self {
        Self {
            status: EstimateStatus::Unpriced,
            cost: None,
            reason: Some(reason),
        }
    }
}

/// Model id -> rates, plus short aliases
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    models: HashMap<String, ModelRates>,
    aliases: HashMap<String, String>,
}

/// Built-in table, shared when no overrides are configured
pub static DEFAULT_PRICING: Lazy<PricingTable> = Lazy::new(PricingTable::builtin);

impl PricingTable {
    pub fn builtin() -> Self {
        let opus_legacy = ModelRates::new(15.0, 75.0, Some(18.75), 1.5);
        let opus = ModelRates::new(5.0, 25.0, Some(6.25), 0.5);
        let sonnet = ModelRates::new(3.0, 15.0, Some(3.75), 0.3);
        let haiku = ModelRates::new(1.0, 5.0, Some(1.25), 0.1);

        let models: Vec<(&str, ModelRates)> = vec![
            // Anthropic
            ("claude-opus-4-6", opus.clone()),
            ("claude-opus-4-5", opus),
            ("claude-opus-4-1", opus_legacy.clone()),
            ("claude-opus-4", opus_legacy.clone()),
            ("claude-3-opus", opus_legacy),
            ("claude-sonnet-4-5", sonnet.clone()),
            ("claude-sonnet-4", sonnet.clone()),
            ("claude-3-7-sonnet", sonnet.clone()),
            ("claude-3-5-sonnet", sonnet),
            ("claude-haiku-4-5", haiku),
            ("claude-3-5-haiku", ModelRates::new(0.8, 4.0, Some(1.0), 0.08)),
            // OpenAI
            ("gpt-5", ModelRates::new(1.25, 10.0, None, 0.125)),
            ("gpt-5-mini", ModelRates::new(0.25, 2.0, None, 0.025)),
            ("gpt-5-nano", ModelRates::new(0.05, 0.4, None, 0.005)),
            ("gpt-4.1", ModelRates::new(2.0, 8.0, None, 0.5)),
            ("gpt-4.1-mini", ModelRates::new(0.4, 1.6, None, 0.1)),
            ("gpt-4.1-nano", ModelRates::new(0.1, 0.4, None, 0.025)),
            ("gpt-4o", ModelRates::new(2.5, 10.0, None, 1.25)),
            ("gpt-4o-mini", ModelRates::new(0.15, 0.6, None, 0.075)),
            ("o3", ModelRates::new(2.0, 8.0, None, 0.5)),
            ("o3-mini", ModelRates::new(1.1, 4.4, None, 0.55)),
            ("o4-mini", ModelRates::new(1.1, 4.4, None, 0.275)),
            ("codex-mini", ModelRates::new(1.5, 6.0, None, 0.375)),
            // Google
            ("gemini-3-pro-preview", ModelRates::new(2.0, 12.0, None, 0.2)),
            ("gemini-2.5-pro", ModelRates::new(1.25, 10.0, None, 0.31)),
            ("gemini-2.5-flash", ModelRates::new(0.3, 2.5, None, 0.075)),
            ("gemini-2.5-flash-lite", ModelRates::new(0.1, 0.4, None, 0.025)),
            ("gemini-2.0-flash", ModelRates::new(0.1, 0.4, None, 0.025)),
        ];
        let aliases = [
            ("opus", "claude-opus-4-5"),
            ("sonnet", "claude-sonnet-4-5"),
            ("haiku", "claude-haiku-4-5"),
            ("chatgpt-4o", "gpt-4o"),
            ("gemini-pro", "gemini-2.5-pro"),
            ("gemini-flash", "gemini-2.5-flash"),
        ];

        Self {
            models: models
                .into_iter()
                .map(|(name, rates)| (name.to_string(), rates))
                .collect(),
            aliases: aliases
                .into_iter()
                .map(|(alias, target)| (alias.to_string(), target.to_string()))
                .collect(),
        }
    }

    /// Add or replace entries; keys are matched after normalization
    pub fn with_overrides(mut self, overrides: &HashMap<String, ModelRates>) -> Self {
        for (model, rates) in overrides {
            self.models.insert(normalize_model_name(model), rates.clone());
        }
        self
    }

    /// Resolve a model id to its table key and rates.
    ///
    /// Tries the id as given, then the normalized id, then the alias table,
    /// then the longest table key the normalized id starts with.
    pub fn lookup(&self, model: &str) -> Option<(&str, &ModelRates)> {
        if let Some((key, rates)) = self.models.get_key_value(model) {
            return Some((key.as_str(), rates));
        }
        let normalized = normalize_model_name(model);
        if normalized.is_empty() {
            return None;
        }
        if let Some((key, rates)) = self.models.get_key_value(&normalized) {
            return Some((key.as_str(), rates));
        }
        if let Some(target) = self.aliases.get(&normalized) {
            if let Some((key, rates)) = self.models.get_key_value(target) {
                return Some((key.as_str(), rates));
            }
        }
        self.models
            .iter()
            .filter(|(key, _)| normalized.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(key, rates)| (key.as_str(), rates))
    }

    /// Price a set of token counts for a model
    pub fn estimate(&self, model: &str, tokens: &TokenCounts) -> Estimate {
        let Some((_, rates)) = self.lookup(model) else {
            return Estimate::unpriced(UnpricedReason::ModelNotFound);
        };

        let input_rate = match (tokens.input, rates.input) {
            (0, rate) => rate.unwrap_or(0.0),
            (_, Some(rate)) => rate,
            (_, None) => return Estimate::unpriced(UnpricedReason::MissingRateFields),
        };
        let output_rate = match (tokens.output, rates.output) {
            (0, rate) => rate.unwrap_or(0.0),
            (_, Some(rate)) => rate,
            (_, None) => return Estimate::unpriced(UnpricedReason::MissingRateFields),
        };

        let (output, reasoning_cost) = match rates.reasoning {
            Some(rate) if tokens.reasoning > 0 => {
                let reasoning = tokens.reasoning.min(tokens.output);
                (tokens.output - reasoning, reasoning as f64 * rate)
            }
            _ => (tokens.output, 0.0),
        };

        let cost = tokens.input as f64 * input_rate
            + output as f64 * output_rate
            + reasoning_cost
            + tokens.cache_read as f64 * rates.cache_read.unwrap_or(0.0)
            + tokens.cache_write as f64 * rates.cache_write.unwrap_or(0.0);

        Estimate::priced(cost / PER_MILLION)
    }
}

/// Price raw token counts against the built-in table
pub fn estimate(
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
    cache_read_tokens: u64,
    cache_write_tokens: u64,
) -> Estimate {
    DEFAULT_PRICING.estimate(
        model,
        &TokenCounts {
            input: input_tokens,
            output: output_tokens,
            cache_read: cache_read_tokens,
            cache_write: cache_write_tokens,
            reasoning: 0,
        },
    )
}

/// Canonical form of a model id for table lookup.
///
/// Lowercases, strips vendor/region prefixes, context-window markers,
/// `-latest`, Bedrock version tags and release dates.
pub fn normalize_model_name(model: &str) -> String {
    let mut name = model.trim().to_lowercase();
    name = RE_MODEL_CONTEXT_SUFFIX.replace(&name, "").into_owned();

    loop {
        let stripped = MODEL_PREFIXES
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix));
        match stripped {
            Some(rest) => name = rest.to_string(),
            None => break,
        }
    }

    if let Some(rest) = name.strip_suffix("-latest") {
        name = rest.to_string();
    }
    name = RE_MODEL_VERSION_SUFFIX.replace(&name, "").into_owned();
    name = RE_MODEL_DATE_SUFFIX.replace(&name, "").into_owned();
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: u64, output: u64) -> TokenCounts {
        TokenCounts {
            input,
            output,
            ..Default::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_normalize_model_name() {
        assert_eq!(normalize_model_name("claude-sonnet-4-20250514"), "claude-sonnet-4");
        assert_eq!(normalize_model_name("anthropic/claude-opus-4-5"), "claude-opus-4-5");
        assert_eq!(
            normalize_model_name("us.anthropic.claude-3-5-haiku-20241022-v1:0"),
            "claude-3-5-haiku"
        );
        assert_eq!(normalize_model_name("claude-3-5-sonnet@20240620"), "claude-3-5-sonnet");
        assert_eq!(normalize_model_name("openai/gpt-4.1-2025-04-14"), "gpt-4.1");
        assert_eq!(normalize_model_name("models/gemini-2.5-pro"), "gemini-2.5-pro");
        assert_eq!(normalize_model_name("Claude-Sonnet-4-5[1m]"), "claude-sonnet-4-5");
        assert_eq!(normalize_model_name("codex-mini-latest"), "codex-mini");
    }

    #[test]
    fn test_lookup_prefers_longest_prefix() {
        let table = PricingTable::builtin();
        assert_eq!(table.lookup("gpt-5-mini-2025-08-07").unwrap().0, "gpt-5-mini");
        assert_eq!(table.lookup("gpt-5-codex").unwrap().0, "gpt-5");
        assert_eq!(table.lookup("gemini-2.5-flash-lite").unwrap().0, "gemini-2.5-flash-lite");
        assert_eq!(table.lookup("sonnet").unwrap().0, "claude-sonnet-4-5");
        assert!(table.lookup("llama-3-70b").is_none());
        assert!(table.lookup("").is_none());
    }

    #[test]
    fn test_estimate_claude_with_cache() {
        let counts = TokenCounts {
            input: 1_000_000,
            output: 1_000_000,
            cache_read: 1_000_000,
            cache_write: 1_000_000,
            reasoning: 0,
        };
        let estimate = DEFAULT_PRICING.estimate("claude-sonnet-4-5-20250929", &counts);
        assert_eq!(estimate.status, EstimateStatus::Priced);
        assert!(approx(estimate.cost.unwrap(), 3.0 + 15.0 + 0.3 + 3.75));
    }

    #[test]
    fn test_unknown_model_is_unpriced() {
        let estimate = estimate("mystery-model", 10, 10, 0, 0);
        assert_eq!(estimate.status, EstimateStatus::Unpriced);
        assert_eq!(estimate.reason, Some(UnpricedReason::ModelNotFound));
        assert_eq!(estimate.cost, None);
    }

    #[test]
    fn test_missing_rate_fields() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "local-model".to_string(),
            ModelRates {
                input: Some(1.0),
                ..Default::default()
            },
        );
        let table = PricingTable::builtin().with_overrides(&overrides);

        let estimate = table.estimate("local-model", &tokens(100, 100));
        assert_eq!(estimate.reason, Some(UnpricedReason::MissingRateFields));

        // no output tokens, so the missing output rate does not matter
        let estimate = table.estimate("local-model", &tokens(1_000_000, 0));
        assert!(approx(estimate.cost.unwrap(), 1.0));
    }

    #[test]
    fn test_missing_optional_rates_price_at_zero() {
        let counts = TokenCounts {
            input: 0,
            output: 0,
            cache_read: 0,
            cache_write: 1_000_000,
            reasoning: 0,
        };
        let estimate = DEFAULT_PRICING.estimate("gpt-4.1", &counts);
        assert_eq!(estimate.status, EstimateStatus::Priced);
        assert!(approx(estimate.cost.unwrap(), 0.0));
    }

    #[test]
    fn test_reasoning_rate_splits_output() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "thinker".to_string(),
            ModelRates {
                input: Some(1.0),
                output: Some(2.0),
                reasoning: Some(10.0),
                ..Default::default()
            },
        );
        let table = PricingTable::default().with_overrides(&overrides);
        let counts = TokenCounts {
            output: 1_000_000,
            reasoning: 400_000,
            ..Default::default()
        };
        let estimate = table.estimate("thinker", &counts);
        assert!(approx(estimate.cost.unwrap(), 0.6 * 2.0 + 0.4 * 10.0));
    }

    #[test]
    fn test_token_counts_move_cached_out_of_input() {
        let mut usage = Usage::default();
        usage.set(INPUT_TOKENS, 1000);
        usage.set(CACHED_INPUT_TOKENS, 600);
        usage.set(OUTPUT_TOKENS, 50);
        let counts = TokenCounts::from_usage(&usage);
        assert_eq!(counts.input, 400);
        assert_eq!(counts.cache_read, 600);
        assert_eq!(counts.total(), usage.total_tokens());
    }

    #[test]
    fn test_overrides_replace_builtin_entries() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "GPT-5".to_string(),
            ModelRates::new(2.0, 20.0, None, 0.2),
        );
        let table = PricingTable::builtin().with_overrides(&overrides);
        let estimate = table.estimate("gpt-5", &tokens(1_000_000, 0));
        assert!(approx(estimate.cost.unwrap(), 2.0));
    }
}
