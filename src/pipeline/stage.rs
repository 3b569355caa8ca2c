//! Named pipeline stages.

use std::fmt;

/// A pipeline stage. Declaration order is the request order, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    CrashReporting,
    AccessLog,
    TracePropagation,
    RequestMetrics,
    ResponseMetrics,
    Envelope,
    BodyParsing,
    SecurityHeaders,
    MetricsEndpoint,
}

impl Stage {
    /// Every stage, outermost first.
    pub const ALL: [Stage; 9] = [
        Stage::CrashReporting,
        Stage::AccessLog,
        Stage::TracePropagation,
        Stage::RequestMetrics,
        Stage::ResponseMetrics,
        Stage::Envelope,
        Stage::BodyParsing,
        Stage::SecurityHeaders,
        Stage::MetricsEndpoint,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::CrashReporting => "crash-reporting",
            Stage::AccessLog => "access-log",
            Stage::TracePropagation => "trace-propagation",
            Stage::RequestMetrics => "request-metrics",
            Stage::ResponseMetrics => "response-metrics",
            Stage::Envelope => "envelope",
            Stage::BodyParsing => "body-parsing",
            Stage::SecurityHeaders => "security-headers",
            Stage::MetricsEndpoint => "metrics-endpoint",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_order_matches_all() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::BodyParsing.to_string(), "body-parsing");
    }
}
