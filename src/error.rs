//! Unified error type for the garden controller core.
//!
//! Every fallible core operation funnels into [`Error`], keeping the API
//! layer's mapping to response codes in one place.  All variants are `Copy`
//! so they can be returned from inside critical sections without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level core error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A watering run is already active; the request was dropped.
    Busy,
    /// An index or value fell outside its valid range.
    OutOfRange(OutOfRange),
    /// A schedule entry failed validation at the config boundary.
    InvalidSchedule(&'static str),
    /// A non-schedule configuration field failed validation.
    Config(&'static str),
}

impl Error {
    /// Response code the request/response layer should surface.
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Busy => 409,
            Self::OutOfRange(_) | Self::InvalidSchedule(_) | Self::Config(_) => 400,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "pump already active"),
            Self::OutOfRange(e) => write!(f, "out of range: {e}"),
            Self::InvalidSchedule(msg) => write!(f, "invalid schedule: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Range errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfRange {
    /// Logical log index at or beyond the current event count.
    LogIndex { index: usize, count: usize },
    /// Valve index at or beyond the number of valves.
    Valve(usize),
    /// Requested valve run longer than the safety limit.
    Duration(u32),
    /// More valve runs than a single request can carry.
    RunCount(usize),
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogIndex { index, count } => {
                write!(f, "log index {index} (event count {count})")
            }
            Self::Valve(index) => write!(f, "valve index {index}"),
            Self::Duration(secs) => write!(f, "valve duration {secs}s"),
            Self::RunCount(len) => write!(f, "{len} valve runs in one request"),
        }
    }
}

impl From<OutOfRange> for Error {
    fn from(e: OutOfRange) -> Self {
        Self::OutOfRange(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Core-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
