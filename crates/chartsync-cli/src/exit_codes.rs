//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - invalid settings or repository definition
pub const CONFIG_ERROR: i32 = 2;

/// Cluster error - the API server could not be reached or refused a request
pub const CLUSTER_ERROR: i32 = 3;

/// Sync error - a pass failed (trust, fetch, parse or persistence)
pub const SYNC_ERROR: i32 = 4;

/// Interrupted by a signal (128 + SIGINT)
pub const INTERRUPTED: i32 = 130;
