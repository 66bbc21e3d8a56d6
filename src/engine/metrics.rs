//! Engine run metrics.
//!
//! Small structs used to observe what a resolution did and how long it took.
//! The server logs them at `debug`; `mimic explain` prints them.
//!
//! Collection is cheap (a couple of counters and two `Instant`s per run), so
//! every resolution records them.

use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

/// Which tier produced the outcome of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tier {
    /// A configured rule supplied the text.
    Rule,
    /// The configured fallback template.
    Fallback,
    /// Canned built-in replies (chat surface only).
    Builtin,
    /// A matched rule carried an error payload.
    Injected,
    /// Responses surface: nothing configured applies; the caller generates a default.
    #[default]
    Unresolved,
    /// Default generation on the responses surface.
    Legacy,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Rule => "rule",
            Tier::Fallback => "fallback",
            Tier::Builtin => "builtin",
            Tier::Injected => "injected",
            Tier::Unresolved => "unresolved",
            Tier::Legacy => "legacy",
        }
    }

    /// Whether a configured rule decided the outcome.
    pub fn is_configured(self) -> bool {
        matches!(self, Tier::Rule | Tier::Injected)
    }
}

/// Counters for a single rule-matching pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchMetrics {
    /// Rules examined before evaluation stopped.
    pub considered: usize,
    /// Rules whose structural filters all held.
    pub structural: usize,
    /// Structural matches dropped by the probability gate.
    pub gated_out: usize,
    /// Candidates replaced by a later match after `continue: true`.
    pub superseded: usize,
}

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for the resolution.
    pub total: Duration,
    /// Time spent in rule matching.
    pub matching: Duration,
    pub matcher: MatchMetrics,
    pub tier: Tier,
}
