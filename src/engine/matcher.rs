//! Ordered rule evaluation.
//!
//! ```text
//! for rule in rules (config order):
//!     endpoint ∧ model ∧ role ∧ contains ∧ regex   ── no ──▶ skip
//!         │ yes
//!     probability gate                              ── no ──▶ skip
//!         │ yes
//!     candidate = rule
//!     rule.terminal?                                ── yes ─▶ stop
//! return candidate
//! ```
//!
//! A `continue: true` rule only proposes a candidate; any later match replaces
//! it. The first terminal match ends evaluation regardless of what follows.

use super::compiled_rules::{CompiledRule, CompiledRules, EndpointMask};
use super::metrics::MatchMetrics;
use super::random::RandomSource;
use crate::Endpoint;

/// The request-side inputs to matching.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatchQuery<'a> {
    pub endpoint: Endpoint,
    pub model: &'a str,
    pub role: &'a str,
    pub last_user: &'a str,
    pub full_text: &'a str,
}

pub(crate) struct RuleMatcher<'a> {
    rules: &'a CompiledRules,
    random: &'a dyn RandomSource,
}

impl<'a> RuleMatcher<'a> {
    pub fn new(rules: &'a CompiledRules, random: &'a dyn RandomSource) -> Self {
        RuleMatcher { rules, random }
    }

    pub fn evaluate(&self, query: &MatchQuery<'_>, metrics: &mut MatchMetrics) -> Option<&'a CompiledRule> {
        let last_user = query.last_user.to_lowercase();
        let full_text = query.full_text.to_lowercase();
        let mut candidate: Option<&'a CompiledRule> = None;

        for rule in &self.rules.rules {
            metrics.considered += 1;

            if !structural_match(rule, query, &last_user, &full_text) {
                continue;
            }
            metrics.structural += 1;

            if !self.passes_gate(rule.probability) {
                metrics.gated_out += 1;
                tracing::debug!(rule = %rule.id, probability = ?rule.probability, "rule gated out");
                continue;
            }

            if let Some(previous) = candidate.replace(rule) {
                metrics.superseded += 1;
                tracing::debug!(rule = %rule.id, replaces = %previous.id, "rule overrides earlier match");
            } else {
                tracing::debug!(rule = %rule.id, terminal = rule.terminal, "rule matched");
            }

            if rule.terminal {
                break;
            }
        }

        candidate
    }

    fn passes_gate(&self, probability: Option<f64>) -> bool {
        match probability {
            None => true,
            Some(p) if p <= 0.0 => false,
            Some(p) if p >= 1.0 => true,
            Some(p) => self.random.unit() < p,
        }
    }
}

/// `last_user` and `full_text` are already lowercased.
fn structural_match(rule: &CompiledRule, query: &MatchQuery<'_>, last_user: &str, full_text: &str) -> bool {
    if !rule.endpoints.contains(EndpointMask::of(query.endpoint)) {
        return false;
    }
    if !rule.models.is_empty() && !rule.models.contains(query.model) {
        return false;
    }
    if rule.role.as_deref().is_some_and(|role| role != query.role) {
        return false;
    }
    if !rule.contains.is_empty()
        && !rule.contains.iter().any(|needle| last_user.contains(needle.as_str()) || full_text.contains(needle.as_str()))
    {
        return false;
    }
    // Regexes see the original casing.
    rule.regex.is_match(query.full_text)
}
