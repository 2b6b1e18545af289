// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Typed errors surfaced by the monitoring core

use thiserror::Error;

/// Errors returned by monitor operations and capture backends
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// The frame source could not be opened; nothing was left running
    #[error("could not open frame source {index}: {reason}")]
    CannotOpenSource { index: u32, reason: String },

    /// The frame source has no more frames
    #[error("frame source reached end of stream")]
    EndOfStream,

    /// The frame source failed while reading
    #[error("frame read failed: {0}")]
    ReadFailure(String),

    /// A threshold value was rejected
    #[error("invalid threshold value {value}: must be a positive number of seconds")]
    InvalidValue { value: f64 },

    /// A category name did not match any violation category
    #[error("unknown violation category '{0}'")]
    UnknownCategory(String),

    /// Monitoring was already running
    #[error("monitoring already running")]
    AlreadyRunning,
}

impl MonitorError {
    /// Create a read failure error
    pub fn read_failure(msg: impl Into<String>) -> Self {
        MonitorError::ReadFailure(msg.into())
    }

    /// Create a cannot-open error for the given source index
    pub fn cannot_open(index: u32, reason: impl Into<String>) -> Self {
        MonitorError::CannotOpenSource {
            index,
            reason: reason.into(),
        }
    }

    /// True for errors that end a running capture session
    pub fn terminates_run(&self) -> bool {
        matches!(self, MonitorError::EndOfStream | MonitorError::ReadFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_errors() {
        assert!(MonitorError::EndOfStream.terminates_run());
        assert!(MonitorError::read_failure("usb unplugged").terminates_run());
        assert!(!MonitorError::AlreadyRunning.terminates_run());
        assert!(!MonitorError::InvalidValue { value: -1.0 }.terminates_run());
    }

    #[test]
    fn test_messages() {
        let err = MonitorError::cannot_open(2, "device busy");
        assert_eq!(err.to_string(), "could not open frame source 2: device busy");
        let err = MonitorError::UnknownCategory("talking".into());
        assert_eq!(err.to_string(), "unknown violation category 'talking'");
    }
}
