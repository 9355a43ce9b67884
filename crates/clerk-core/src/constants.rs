//! Tunables for timeouts, TTLs, and bounds.
//!
//! TTLs are in seconds (compared against `chrono` timestamps); debounce
//! windows are in milliseconds (driven by the tokio clock).

/// Idle TTL for generic, seal, and invoice sessions.
pub const SESSION_TTL_SECS: i64 = 30 * 60;

/// Idle TTL for a file batch whose destination workflow is still unknown.
pub const FILE_INTENT_TTL_SECS: i64 = 3 * 60;

/// TTL for unredeemed confirmation tokens.
pub const CONFIRM_TTL_SECS: i64 = 15 * 60;

/// Idle TTL for conversation windows.
pub const WINDOW_TTL_SECS: i64 = 24 * 3600;

/// Age bound for dedup-ledger entries.
pub const DEDUP_TTL_SECS: i64 = 24 * 3600;

/// Count bound for the dedup ledger; oldest entries beyond this are evicted
/// before age is even considered.
pub const DEDUP_MAX_ENTRIES: usize = 4096;

/// Age bound for remembered consumed confirmation tokens.
pub const CONSUMED_TTL_SECS: i64 = 24 * 3600;

/// Debounce after the first file of a batch (fast preview).
pub const FIRST_FILE_DEBOUNCE_MS: u64 = 2_000;

/// Debounce extension for each subsequent file of a batch.
pub const BATCH_DEBOUNCE_MS: u64 = 8_000;

/// Delay before asking the user to pick a destination workflow for
/// unattributed files.
pub const FILE_INTENT_PROMPT_MS: u64 = 3 * 60 * 1_000;

/// Minimum inter-arrival interval per user before an event is rejected as
/// too frequent.
pub const RATE_MIN_INTERVAL_MS: i64 = 2_000;

/// Maximum conversation turns kept as classification context.
pub const CONVERSATION_CAP: usize = 10;

/// Maximum characters of extracted document text handed to the AI.
pub const EXTRACT_TEXT_MAX: usize = 8_000;

/// Maximum upload size accepted before any network call.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Interval between TTL sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Total per-request deadline for every outbound HTTP call. Nothing the
/// orchestrator awaits may block indefinitely.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Parse failures of a clarifying message tolerated silently before the
/// reply gains a cancellation hint.
pub const CLARIFY_SILENT_RETRIES: u32 = 2;
