use serde::Serialize;
use ts_rs::TS;

use super::{EstimateStatus, PricingTable, TokenCounts, UnpricedReason};
use crate::transcript::types::TranscriptMessage;

/// How a message's cost was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "pricing/")]
pub enum Confidence {
    /// Copied from a cost the provider logged
    Reported,
    Estimated,
    Unpriced,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "pricing/")]
pub enum PricingStatus {
    Priced,
    Unpriced,
    None,
}

/// Cost attached to a message for display
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "pricing/")]
pub struct CostInfo {
    pub usd: Option<f64>,
    pub confidence: Confidence,
    pub pricing_status: PricingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnpricedReason>,
    #[ts(type = "number")]
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Work out the cost of a single message.
///
/// A provider-reported cost wins. Without a model or tokens there is nothing
/// to price. Otherwise the pricing table decides.
pub fn cost_for_message(message: &TranscriptMessage, pricing: &PricingTable) -> CostInfo {
    let usage = message.message.usage.as_ref();
    let model = message
        .message
        .model
        .as_deref()
        .filter(|m| !m.trim().is_empty());
    let total_tokens = usage.map(|u| u.total_tokens()).unwrap_or(0);

    let info = |usd, confidence, pricing_status, reason| CostInfo {
        usd,
        confidence,
        pricing_status,
        reason,
        total_tokens,
        model: model.map(String::from),
    };

    if let Some(reported) = usage.and_then(|u| u.cost_usd) {
        return info(
            Some(reported),
            Confidence::Reported,
            PricingStatus::Priced,
            None,
        );
    }

    let (Some(model), Some(usage)) = (model, usage) else {
        return info(None, Confidence::None, PricingStatus::None, None);
    };
    if total_tokens == 0 {
        return info(None, Confidence::None, PricingStatus::None, None);
    }

    let estimate = pricing.estimate(model, &TokenCounts::from_usage(usage));
    match estimate.status {
        EstimateStatus::Priced => info(
            estimate.cost,
            Confidence::Estimated,
            PricingStatus::Priced,
            None,
        ),
        EstimateStatus::Unpriced => info(
            None,
            Confidence::Unpriced,
            PricingStatus::Unpriced,
            estimate.reason,
        ),
    }
}

/// Attach a `cost` to every message
pub fn annotate_costs(
    messages: Vec<TranscriptMessage>,
    pricing: &PricingTable,
) -> Vec<TranscriptMessage> {
    messages
        .into_iter()
        .map(|mut message| {
            message.cost = Some(cost_for_message(&message, pricing));
            message
        })
        .collect()
}
