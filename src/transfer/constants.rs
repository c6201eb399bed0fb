//! Constants for the transfer module (chunking, timeouts).

/// Write and hash granularity in bytes.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Default HTTP connect timeout for the built-in fallback (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP idle read timeout for the built-in fallback (30 seconds).
///
/// This bounds the wait for each read, not the whole transfer, so large
/// archives on slow links are not cut off.
pub const READ_TIMEOUT_SECS: u64 = 30;

/// User-Agent sent by the built-in fallback.
pub const USER_AGENT: &str = concat!("rpip/", env!("CARGO_PKG_VERSION"));
