//
// MIT License
//
// Copyright (c) 2024 Firelink Data
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
// File created: 2024-02-05
// Last updated: 2024-11-02
//

use std::error;
use std::fmt;
use std::result;

/// Generic result type which allows for dynamic dispatch of our custom error variants.
pub type Result<T> = result::Result<T, Box<dyn error::Error>>;

/// Error raised while assembling a [`crate::thread`]-spawning component (a registry,
/// a writer, a collector) from incomplete or contradictory configuration.
#[derive(Debug)]
pub struct SetupError {
    details: String,
}

impl SetupError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            details: msg.into(),
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl error::Error for SetupError {
    fn description(&self) -> &str {
        &self.details
    }
}

/// Error raised when a decoder's returned record does not implement the capability
/// set a decoder requires of it. This is always a developer error: it means a decoder
/// was registered with a handler that builds the wrong kind of record.
#[derive(Debug)]
pub struct SchemaViolationError {
    details: String,
}

impl SchemaViolationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            details: msg.into(),
        }
    }
}

impl fmt::Display for SchemaViolationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema violation: {}", self.details)
    }
}

impl error::Error for SchemaViolationError {}

/// Error raised by a [`crate::error::Result`]-returning writer call when the
/// underlying I/O fails. The writer that raised it is poisoned afterwards.
#[derive(Debug)]
pub struct WriterIoError {
    details: String,
}

impl WriterIoError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            details: msg.into(),
        }
    }
}

impl fmt::Display for WriterIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "writer I/O error: {}", self.details)
    }
}

impl error::Error for WriterIoError {}

/// The coarse error kinds tallied in the Collector's shutdown summary (see §7).
/// `InvalidConfig` and `SourceUnavailable` never reach the summary — they are
/// fatal before `run()` starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WriterIo,
    DecoderHandler,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::WriterIo => write!(f, "WriterIO"),
            ErrorKind::DecoderHandler => write!(f, "DecoderHandler"),
        }
    }
}

#[cfg(test)]
mod tests_error {
    use super::*;

    #[test]
    fn test_setup_error() {
        assert_eq!(
            "uh oh stinky something went wrong!",
            SetupError::new("uh oh stinky something went wrong!")
                .to_string()
                .as_str(),
        );
    }

    #[test]
    fn test_schema_violation_error_message() {
        let err = SchemaViolationError::new("record does not implement AuditRecord");
        assert_eq!(
            "schema violation: record does not implement AuditRecord",
            err.to_string(),
        );
    }

    #[test]
    fn test_writer_io_error_message() {
        let err = WriterIoError::new("disk full");
        assert_eq!("writer I/O error: disk full", err.to_string());
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!("WriterIO", ErrorKind::WriterIo.to_string());
        assert_eq!("DecoderHandler", ErrorKind::DecoderHandler.to_string());
    }
}
