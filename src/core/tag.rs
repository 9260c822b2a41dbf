//! Message tag generation.
//!
//! Tags look like `"<unix-seconds>.--<counter>"`. The counter belongs to one
//! connection and only moves forward after a write was confirmed, so a tag
//! whose write failed is handed out again for the next attempt.

use crate::error::Result;
use crate::utils::time::unix_seconds;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque correlation identifier.
///
/// Unique per connection. Callers must not rely on tags sorting in issue order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageTag(String);

impl MessageTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MessageTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageTag {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageTag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Per-connection tag source
#[derive(Debug, Default)]
pub struct TagGenerator {
    count: AtomicU64,
}

impl TagGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from `count`, e.g. when resuming a session
    pub fn starting_at(count: u64) -> Self {
        Self {
            count: AtomicU64::new(count),
        }
    }

    /// Mint a tag from the current clock and counter. Does not advance the counter.
    pub fn new_tag(&self) -> Result<MessageTag> {
        let ts = unix_seconds()?;
        Ok(Self::format(ts, self.count()))
    }

    /// Record a confirmed write
    pub fn advance(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn format(unix_seconds: u64, count: u64) -> MessageTag {
        MessageTag(format!("{unix_seconds}.--{count}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(TagGenerator::format(1700000000, 0).as_str(), "1700000000.--0");
        assert_eq!(TagGenerator::format(1700000000, 42).as_str(), "1700000000.--42");
    }

    #[test]
    fn test_counter_only_moves_on_advance() {
        let gen = TagGenerator::new();
        let a = gen.new_tag().unwrap();
        let b = gen.new_tag().unwrap();
        assert!(a.as_str().ends_with(".--0"));
        assert!(b.as_str().ends_with(".--0"));

        gen.advance();
        let c = gen.new_tag().unwrap();
        assert!(c.as_str().ends_with(".--1"));
        assert_eq!(gen.count(), 1);
    }

    #[test]
    fn test_resume_counter() {
        let gen = TagGenerator::starting_at(9);
        assert!(gen.new_tag().unwrap().as_str().ends_with(".--9"));
    }
}
