//! Exit codes for the csv-append CLI.
//!
//! Exit codes communicate the outcome without requiring log parsing.

/// Exit codes for csv-append runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every record was appended
    Success = 0,

    /// Stream finished but some buffered rows could not be appended
    PartialFail = 3,

    /// Settings missing, unreadable or rejected by validation
    ConfigError = 10,

    /// Field definitions or input records could not be read
    InputError = 11,

    /// I/O error outside a flush
    IoError = 13,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Success
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Map a library error onto its exit code by error-code range.
    pub fn from_error(err: &ca_common::Error) -> Self {
        match err.code() {
            10..=19 => ExitCode::ConfigError,
            20..=29 => ExitCode::InputError,
            30..=39 => ExitCode::PartialFail,
            60..=69 => ExitCode::IoError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
