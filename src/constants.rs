use regex::Regex;
use once_cell::sync::Lazy;

/// Messages per page when the request does not say
pub const DEFAULT_PAGE_LIMIT: usize = 200;

/// Upper bound on the page size a client may request
pub const MAX_PAGE_LIMIT: usize = 500;

/// Largest config file we are willing to parse
pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Sentinel `project_id` values for sessions not grouped by project
pub const CODEX_PROJECT_ID: &str = "codex-sessions";
pub const GEMINI_PROJECT_ID: &str = "gemini-sessions";

/// Vendor and region prefixes stripped from model ids before pricing lookup
/// Examples: anthropic/claude-sonnet-4, us.anthropic.claude-3-5-haiku, models/gemini-2.5-pro
pub const MODEL_PREFIXES: &[&str] = &[
    "us.", "eu.", "apac.", "anthropic/", "anthropic.", "openai/", "google/", "models/",
];

/// Matches a trailing release date on a model id
/// Examples: -20250514, -2025-04-16, @20240620
pub static RE_MODEL_DATE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[-@]\d{8}|-\d{4}-\d{2}-\d{2})$")
        .expect("Invalid regex pattern for model date suffix")
});

/// Matches a Bedrock-style version tag
/// Examples: -v1:0, -v2
pub static RE_MODEL_VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-v\d+(?::\d+)?$")
        .expect("Invalid regex pattern for model version suffix")
});

/// Matches a context-window marker
/// Examples: [1m]
pub static RE_MODEL_CONTEXT_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\d+[km]\]$")
        .expect("Invalid regex pattern for model context suffix")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_suffix_patterns() {
        assert!(RE_MODEL_DATE_SUFFIX.is_match("claude-sonnet-4-20250514"));
        assert!(RE_MODEL_DATE_SUFFIX.is_match("gpt-4.1-2025-04-14"));
        assert!(RE_MODEL_DATE_SUFFIX.is_match("claude-3-5-sonnet@20240620"));
        assert!(!RE_MODEL_DATE_SUFFIX.is_match("gemini-2.5-pro"));
    }

    #[test]
    fn test_version_and_context_suffixes() {
        assert!(RE_MODEL_VERSION_SUFFIX.is_match("claude-3-5-haiku-20241022-v1:0"));
        assert!(RE_MODEL_CONTEXT_SUFFIX.is_match("claude-sonnet-4-5[1m]"));
        assert!(!RE_MODEL_CONTEXT_SUFFIX.is_match("claude-sonnet-4-5"));
    }
}
