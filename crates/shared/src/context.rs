//! Explicit call context threaded through job passes and external calls.

use std::fmt;

use uuid::Uuid;

/// Header name used when the correlation id crosses an HTTP boundary.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Context value passed explicitly across call boundaries.
///
/// Carries the correlation id that ties log lines, database writes and
/// outbound requests of one unit of work together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    correlation_id: String,
}

impl CallContext {
    /// Starts a new context with a fresh correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::now_v7().to_string(),
        }
    }

    /// Starts a context for a scheduled job pass; the id is prefixed with the job name.
    #[must_use]
    pub fn for_job(job: &str) -> Self {
        Self {
            correlation_id: format!("{job}-{}", Uuid::now_v7()),
        }
    }

    /// Continues a context received from a caller, or starts a new one.
    #[must_use]
    pub fn from_incoming(correlation_id: Option<&str>) -> Self {
        match correlation_id.map(str::trim) {
            Some(id) if !id.is_empty() => Self {
                correlation_id: id.to_string(),
            },
            _ => Self::new(),
        }
    }

    /// Returns the correlation id.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_job_prefixes_name() {
        let ctx = CallContext::for_job("send_krav");
        assert!(ctx.correlation_id().starts_with("send_krav-"));
    }

    #[test]
    fn test_from_incoming_keeps_caller_id() {
        let ctx = CallContext::from_incoming(Some("abc-123"));
        assert_eq!(ctx.correlation_id(), "abc-123");
    }

    #[test]
    fn test_from_incoming_blank_starts_new() {
        let ctx = CallContext::from_incoming(Some("  "));
        assert!(!ctx.correlation_id().trim().is_empty());
        assert_ne!(ctx.correlation_id(), "  ");
    }
}
