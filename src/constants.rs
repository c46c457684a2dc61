//! # Constants
//!
//! Default values used when the corresponding environment variable is unset.

/// Default HTTP port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default time to wait for the HTTP server to bind (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default poll interval while waiting for the HTTP server (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default periodic resync interval for Ready resources (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default deadline of a single reconcile invocation (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Default bound on remove/purge rounds when draining a bucket on deletion
pub const DEFAULT_MAX_DRAIN_ROUNDS: u32 = 16;

/// Default number of re-read-and-retry attempts on a record write conflict
pub const DEFAULT_STATUS_CONFLICT_RETRIES: u32 = 5;

/// Default Fibonacci backoff bounds for failed reconciles (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Requeue used when the backoff state cannot be read (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Delay before restarting a failed watch stream (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Field manager and event reporter name
pub const CONTROLLER_NAME: &str = "minio-operator";

/// Region used for MinIO request signing when none is configured
pub const DEFAULT_MINIO_REGION: &str = "us-east-1";

/// Maximum number of keys per S3 DeleteObjects request
pub const DELETE_OBJECTS_BATCH_SIZE: usize = 1000;

/// Server-side watch timeout, kept below the client read timeout (seconds)
pub const DEFAULT_WATCH_TIMEOUT_SECS: u32 = 25;

/// Initial and maximum delay after the API server reports 429 on a watch (milliseconds)
pub const DEFAULT_WATCH_THROTTLE_BACKOFF_MS: u64 = 1_000;
pub const MAX_WATCH_THROTTLE_BACKOFF_MS: u64 = 30_000;
