//! Centralized constants for kumo.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "kumo";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Maximum tokens for completions.
pub const MAX_TOKENS: u32 = 4096;

/// Base URL for the Messages API.
pub const API_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
pub const API_VERSION: &str = "2023-06-01";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Readline history filename.
pub const HISTORY_FILENAME: &str = "history.txt";

// --- Tool limits ---

/// Maximum file size (bytes) the cat tool will read.
pub const READ_FILE_MAX_SIZE: u64 = 256 * 1024;

/// Byte threshold for binary file detection (check first N bytes for null).
pub const BINARY_DETECTION_BYTES: usize = 8192;

/// Maximum number of matching lines the search tool returns.
pub const SEARCH_MAX_MATCHES: usize = 200;

// --- System prompt context ---

/// Number of project files listed in the system prompt context.
pub const PROMPT_CONTEXT_FILES: usize = 10;
