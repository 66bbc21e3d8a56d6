//! Rule compilation.
//!
//! This module holds the *static* side of the engine: everything derived from
//! the configured rule list once, at engine construction, so that evaluating a
//! request does no parsing and no per-rule allocation.
//!
//! Matching is split into two phases:
//!
//! 1. **Compile** (this module): lowercase substring filters, compile regexes,
//!    fold the endpoint filter into an [`EndpointMask`], resolve the effective
//!    chunk delay of every rule.
//! 2. **Evaluate** (see `matcher.rs`): walk the compiled rules in order for one
//!    request.
//!
//! ## Invariants
//!
//! - `CompiledRule::index` is the position of the source rule in
//!   `BotConfig::rules`; the resolver uses it to reach the `respond` payload.
//! - `CompiledRules::rules` keeps configuration order. Order is priority.
//! - A regex that fails to compile yields [`RegexFilter::Invalid`], which never
//!   matches. It is reported once here, not per request.

use crate::Endpoint;
use crate::config::BotConfig;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;

// --- Rule compilation ---------------------------------------------------------

/// Rule identifier (index into `BotConfig::rules`).
pub(crate) type RuleId = usize;

bitflags::bitflags! {
    /// API surfaces a rule accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EndpointMask: u8 {
        const CHAT      = 1 << 0;
        const RESPONSES = 1 << 1;
    }
}

impl EndpointMask {
    pub fn of(endpoint: Endpoint) -> Self {
        match endpoint {
            Endpoint::Chat => EndpointMask::CHAT,
            Endpoint::Responses => EndpointMask::RESPONSES,
        }
    }
}

#[derive(Debug)]
pub(crate) enum RegexFilter {
    /// No regex configured.
    Any,
    Pattern(Regex),
    /// Configured but unparseable.
    Invalid,
}

impl RegexFilter {
    fn compile(rule_id: &str, pattern: Option<&str>) -> Self {
        let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
            return RegexFilter::Any;
        };
        match Regex::new(pattern) {
            Ok(regex) => RegexFilter::Pattern(regex),
            Err(err) => {
                tracing::warn!(rule = rule_id, pattern, error = %err, "invalid regex, rule will never match");
                RegexFilter::Invalid
            }
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            RegexFilter::Any => true,
            RegexFilter::Pattern(regex) => regex.is_match(text),
            RegexFilter::Invalid => false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct CompiledRule {
    pub index: RuleId,
    pub id: String,
    pub endpoints: EndpointMask,
    /// Empty accepts any model.
    pub models: HashSet<String>,
    pub role: Option<String>,
    /// Lowercased once; empty is always satisfied.
    pub contains: Vec<String>,
    pub regex: RegexFilter,
    pub probability: Option<f64>,
    /// `false` when the rule carries `continue: true`.
    pub terminal: bool,
    pub delay: Duration,
}

/// Pre-compiled rule table in configuration order.
#[derive(Debug, Default)]
pub(crate) struct CompiledRules {
    pub rules: Vec<CompiledRule>,
}

impl CompiledRules {
    pub fn new(config: &BotConfig) -> Self {
        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let filter = &rule.r#match;
                CompiledRule {
                    index,
                    id: rule.id.clone(),
                    endpoints: filter.endpoint.map_or(EndpointMask::all(), EndpointMask::of),
                    models: filter.model.0.iter().filter(|m| !m.is_empty()).cloned().collect(),
                    role: filter.role.clone().filter(|r| !r.is_empty()),
                    contains: filter.contains.iter().map(|s| s.to_lowercase()).collect(),
                    regex: RegexFilter::compile(&rule.id, filter.regex.as_deref()),
                    probability: rule.probability,
                    terminal: !rule.r#continue,
                    delay: config.rule_delay(rule),
                }
            })
            .collect();

        CompiledRules { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
streaming: { chunk_delay_ms: 90 }
rules:
  - id: any
  - id: narrow
    match:
      endpoint: responses
      model: [gpt-4o, ""]
      role: ""
      contains: [HeLLo]
      regex: "^a+$"
    continue: true
    stream_override: { chunk_delay_ms: 7 }
  - id: broken
    match: { regex: "(unclosed" }
"#;

    #[test]
    fn compiles_filters_once() {
        let config = BotConfig::from_yaml_str(RULES).unwrap();
        let compiled = CompiledRules::new(&config);
        assert_eq!(compiled.len(), 3);

        let any = &compiled.rules[0];
        assert_eq!(any.endpoints, EndpointMask::all());
        assert!(any.models.is_empty() && any.role.is_none() && any.contains.is_empty());
        assert!(matches!(any.regex, RegexFilter::Any));
        assert!(any.terminal);
        assert_eq!(any.delay, Duration::from_millis(90));

        let narrow = &compiled.rules[1];
        assert_eq!(narrow.index, 1);
        assert_eq!(narrow.endpoints, EndpointMask::RESPONSES);
        assert_eq!(narrow.models, HashSet::from(["gpt-4o".to_string()]));
        assert_eq!(narrow.role, None);
        assert_eq!(narrow.contains, ["hello"]);
        assert!(narrow.regex.is_match("aaa") && !narrow.regex.is_match("ab"));
        assert!(!narrow.terminal);
        assert_eq!(narrow.delay, Duration::from_millis(7));
    }

    #[test]
    fn empty_endpoint_tag_covers_both_surfaces() {
        let config = BotConfig::from_yaml_str(
            "rules:\n  - { id: any, match: { endpoint: \"\", contains: [hello] }, respond: { text: hit } }\n",
        )
        .unwrap();
        let compiled = CompiledRules::new(&config);

        assert_eq!(compiled.rules[0].endpoints, EndpointMask::all());
        assert!(compiled.rules[0].endpoints.contains(EndpointMask::of(Endpoint::Chat)));
        assert!(compiled.rules[0].endpoints.contains(EndpointMask::of(Endpoint::Responses)));
    }

    #[test]
    fn invalid_regex_never_matches() {
        let config = BotConfig::from_yaml_str(RULES).unwrap();
        let broken = &CompiledRules::new(&config).rules[2];

        assert!(matches!(broken.regex, RegexFilter::Invalid));
        assert!(!broken.regex.is_match(""));
        assert!(!broken.regex.is_match("(unclosed"));
    }
}
