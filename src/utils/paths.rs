use std::env;
use std::path::{Path, PathBuf};

// =============================================================================
// Core Path Functions
// =============================================================================

/// Get user home directory from $HOME, falling back to the platform lookup
/// NEVER use "~" as Rust's std::fs does not expand it; see `expand_home`
pub fn get_home_dir() -> Result<PathBuf, String> {
    env::var("HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(dirs::home_dir)
        .ok_or_else(|| "HOME environment variable not set".to_string())
}

/// Get the sessionscope data directory
/// Priority:
/// 1. SESSIONSCOPE_DATA_ROOT environment variable
/// 2. $HOME/.sessionscope
pub fn get_data_root() -> Result<PathBuf, String> {
    if let Ok(root) = env::var("SESSIONSCOPE_DATA_ROOT") {
        if !root.trim().is_empty() {
            return Ok(PathBuf::from(root));
        }
    }
    Ok(get_home_dir()?.join(".sessionscope"))
}

/// Returns: <data_root>/config.yaml
pub fn get_config_path() -> Result<PathBuf, String> {
    Ok(get_data_root()?.join("config.yaml"))
}

/// Expand a leading `~/` in a user-supplied path
pub fn expand_home(path: &str) -> Result<PathBuf, String> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(get_home_dir()?.join(rest)),
        None if path == "~" => get_home_dir(),
        None => Ok(PathBuf::from(path)),
    }
}

// =============================================================================
// Provider Transcript Directories
// =============================================================================

/// Claude Code projects directory
/// Returns: $CLAUDE_CONFIG_DIR/projects or $HOME/.claude/projects
pub fn default_claude_projects_dir() -> Result<PathBuf, String> {
    if let Ok(dir) = env::var("CLAUDE_CONFIG_DIR") {
        return Ok(PathBuf::from(dir).join("projects"));
    }
    Ok(get_home_dir()?.join(".claude").join("projects"))
}

/// Codex rollout directory
/// Returns: $CODEX_HOME/sessions or $HOME/.codex/sessions
pub fn default_codex_sessions_dir() -> Result<PathBuf, String> {
    if let Ok(dir) = env::var("CODEX_HOME") {
        return Ok(PathBuf::from(dir).join("sessions"));
    }
    Ok(get_home_dir()?.join(".codex").join("sessions"))
}

/// Gemini CLI scratch directory holding per-project `chats/`
/// Returns: $HOME/.gemini/tmp
pub fn default_gemini_tmp_dir() -> Result<PathBuf, String> {
    Ok(get_home_dir()?.join(".gemini").join("tmp"))
}

/// File stem as an owned string, if it is valid UTF-8
pub fn file_stem_string(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(String::from)
}
