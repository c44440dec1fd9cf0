//! Session lookup
//!
//! A session is one transcript file. `SessionIndex` discovers them by
//! walking each provider's transcript directory and caches the records;
//! a lookup miss triggers one rescan so new sessions show up without a
//! restart.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use ts_rs::TS;
use walkdir::WalkDir;

use crate::config::SourcesConfig;
use crate::constants::{CODEX_PROJECT_ID, GEMINI_PROJECT_ID};
use crate::providers::ProviderKind;
use crate::utils::paths::file_stem_string;

/// What the pipeline needs to know about a session
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "sessions/")]
pub struct SessionRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub project_id: String,
    #[ts(type = "string")]
    pub jsonl_path: PathBuf,
    /// RFC 3339 modification time of the transcript file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

/// Session lookup used by the HTTP layer
pub trait SessionStore: Send + Sync {
    fn get(&self, id: &str) -> Option<SessionRecord>;

    /// All known sessions, most recently modified first
    fn list(&self) -> Vec<SessionRecord>;
}

/// Filesystem-backed session index
#[derive(Debug, Default)]
pub struct SessionIndex {
    claude_dir: Option<PathBuf>,
    codex_dir: Option<PathBuf>,
    gemini_dir: Option<PathBuf>,
    sessions: DashMap<String, SessionRecord>,
    /// Ids added through `insert`, kept across rescans
    pinned: DashSet<String>,
}

impl SessionIndex {
    pub fn new(sources: &SourcesConfig) -> Self {
        Self::with_dirs(sources.claude_dir(), sources.codex_dir(), sources.gemini_dir())
    }

    pub fn with_dirs(
        claude_dir: Option<PathBuf>,
        codex_dir: Option<PathBuf>,
        gemini_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            claude_dir,
            codex_dir,
            gemini_dir,
            sessions: DashMap::new(),
            pinned: DashSet::new(),
        }
    }

    /// Rescan every source directory. Returns the number of sessions found.
    pub fn refresh(&self) -> usize {
        let mut found = Vec::new();
        if let Some(dir) = &self.claude_dir {
            found.extend(scan_claude(dir));
        }
        if let Some(dir) = &self.codex_dir {
            found.extend(scan_codex(dir));
        }
        if let Some(dir) = &self.gemini_dir {
            found.extend(scan_gemini(dir));
        }

        let ids: HashSet<String> = found.iter().map(|r| r.id.clone()).collect();
        self.sessions
            .retain(|id, _| ids.contains(id) || self.pinned.contains(id));
        for record in found {
            self.sessions.insert(record.id.clone(), record);
        }

        tracing::debug!("Session index refreshed: {} sessions", ids.len());
        ids.len()
    }

    /// Register a session that does not come from a scanned directory
    pub fn insert(&self, record: SessionRecord) {
        self.pinned.insert(record.id.clone());
        self.sessions.insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for SessionIndex {
    fn get(&self, id: &str) -> Option<SessionRecord> {
        if let Some(record) = self.sessions.get(id) {
            return Some(record.value().clone());
        }
        self.refresh();
        self.sessions.get(id).map(|r| r.value().clone())
    }

    fn list(&self) -> Vec<SessionRecord> {
        self.refresh();
        let mut records: Vec<SessionRecord> =
            self.sessions.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| b.modified_at.cmp(&a.modified_at).then(a.id.cmp(&b.id)));
        records
    }
}

fn modified_at(path: &Path) -> Option<String> {
    let modified = path.metadata().ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified).to_rfc3339())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| extensions.contains(&e))
}

/// `<projects>/<project>/<session-uuid>.jsonl`
fn scan_claude(dir: &Path) -> Vec<SessionRecord> {
    WalkDir::new(dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), &["jsonl"]))
        .filter_map(|entry| {
            let path = entry.path();
            let id = file_stem_string(path)?;
            let project_id = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())?
                .to_string();
            Some(SessionRecord {
                id,
                provider: Some(ProviderKind::Claude.to_string()),
                project_id,
                jsonl_path: path.to_path_buf(),
                modified_at: modified_at(path),
            })
        })
        .collect()
}

/// Any `.jsonl` rollout or `.json` log below the sessions directory
fn scan_codex(dir: &Path) -> Vec<SessionRecord> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), &["jsonl", "json"]))
        .filter_map(|entry| {
            let path = entry.path();
            Some(SessionRecord {
                id: format!("codex-{}", file_stem_string(path)?),
                provider: Some(ProviderKind::Codex.to_string()),
                project_id: CODEX_PROJECT_ID.to_string(),
                jsonl_path: path.to_path_buf(),
                modified_at: modified_at(path),
            })
        })
        .collect()
}

/// `<tmp>/<project-hash>/chats/<session>.json`
fn scan_gemini(dir: &Path) -> Vec<SessionRecord> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let path = e.path();
            e.file_type().is_file()
                && has_extension(path, &["json"])
                && path
                    .parent()
                    .and_then(|p| p.file_name())
                    .map_or(false, |n| n == "chats")
        })
        .filter_map(|entry| {
            let path = entry.path();
            Some(SessionRecord {
                id: format!("gemini-{}", file_stem_string(path)?),
                provider: Some(ProviderKind::Gemini.to_string()),
                project_id: GEMINI_PROJECT_ID.to_string(),
                jsonl_path: path.to_path_buf(),
                modified_at: modified_at(path),
            })
        })
        .collect()
}
