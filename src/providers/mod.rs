//! Transcript provider detection
//!
//! Each session was written by one assistant CLI, and the file format
//! follows from that.
//!
//! # Detection order (first match wins)
//! - Explicit `provider` field on the session record (`codex`, `gemini`)
//! - `project_id` sentinel (`codex-sessions`, `gemini-sessions`)
//! - Session id prefix (`codex-`, `gemini-`)
//! - A `.codex` / `.gemini` directory segment in the transcript path
//! - Otherwise Claude Code

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Component;
use ts_rs::TS;

use crate::constants::{CODEX_PROJECT_ID, GEMINI_PROJECT_ID};
use crate::sessions::SessionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "sessions/")]
pub enum ProviderKind {
    /// Claude Code JSONL transcripts
    #[default]
    Claude,
    /// OpenAI Codex CLI rollouts
    Codex,
    /// Gemini CLI chat logs
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::Codex => "codex",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Parse a provider name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "claude" => Some(ProviderKind::Claude),
            "codex" => Some(ProviderKind::Codex),
            "gemini" => Some(ProviderKind::Gemini),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All supported provider names
pub fn supported_providers() -> Vec<&'static str> {
    vec!["claude", "codex", "gemini"]
}

/// Decide which format a session's transcript is in. Never fails.
pub fn detect_provider(session: &SessionRecord) -> ProviderKind {
    if let Some(kind @ (ProviderKind::Codex | ProviderKind::Gemini)) =
        session.provider.as_deref().and_then(ProviderKind::from_name)
    {
        return kind;
    }

    match session.project_id.as_str() {
        CODEX_PROJECT_ID => return ProviderKind::Codex,
        GEMINI_PROJECT_ID => return ProviderKind::Gemini,
        _ => {}
    }

    if session.id.starts_with("codex-") {
        return ProviderKind::Codex;
    }
    if session.id.starts_with("gemini-") {
        return ProviderKind::Gemini;
    }

    for component in session.jsonl_path.components() {
        if let Component::Normal(segment) = component {
            match segment.to_str() {
                Some(".codex") => return ProviderKind::Codex,
                Some(".gemini") => return ProviderKind::Gemini,
                _ => {}
            }
        }
    }

    ProviderKind::Claude
}
