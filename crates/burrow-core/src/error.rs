use thiserror::Error;

/// Unified error type for the entire Burrow runtime.
///
/// Only `Provider`, `Cancelled`, and `Persistence` escape an agent
/// invocation; tool-level faults are converted to `tool` role messages by the
/// registry and loop so the model can self-correct.
#[derive(Error, Debug)]
pub enum BurrowError {
    // ── Configuration ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Model endpoint ─────────────────────────────────────────
    #[error("llm provider error: {0}")]
    Provider(String),

    /// Cooperative cancellation was observed. Distinct from a transport
    /// failure so callers can tell a shutdown apart from a flaky endpoint.
    #[error("operation cancelled")]
    Cancelled,

    // ── Tools & sandbox ────────────────────────────────────────
    #[error("path escapes workspace bounds: {0}")]
    PathEscape(String),

    #[error("tool execution failed: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    // ── Session persistence ────────────────────────────────────
    #[error("session persistence error: {0}")]
    Persistence(String),

    // ── Channels ───────────────────────────────────────────────
    #[error("channel error: {channel}: {reason}")]
    Channel { channel: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BurrowError>;
