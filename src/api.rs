use crate::config::{Annotation, BotConfig, ErrorPayload};
use crate::engine::{self, RandomSource, RunMetrics, ThreadRandom, ToolRegistry};
use crate::{Endpoint, Input, Message};
use std::sync::Arc;
use std::time::Duration;

/// An intentional failure carried by a matched rule.
///
/// Never a fault of the mock itself: the HTTP layer serves it with its own
/// status code and the engine does not log it above `debug`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("injected error {}: {} ({})", .0.status, .0.message, .0.code)]
pub struct InjectedError(pub ErrorPayload);

/// Outcome of [`Engine::resolve_chat`]: text or an injected error, never both.
#[derive(Debug, Clone)]
pub struct ChatResolution {
    pub outcome: Result<String, InjectedError>,
    /// Pause between streamed chunks.
    pub delay: Duration,
    /// Id of the rule that produced the outcome, if any.
    pub rule: Option<String>,
}

/// A tool call output placed before the message item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallStub {
    pub id: String,
    /// Output item type, e.g. `web_search_call`.
    pub kind: String,
    pub status: String,
}

/// Outcome of [`Engine::resolve_responses`] (or [`Engine::legacy_response`]).
#[derive(Debug, Clone)]
pub struct ResolvedResponse {
    pub text: String,
    /// Tool call stubs, in invocation order.
    pub prefix_tools: Vec<ToolCallStub>,
    /// Tool citations first, then the rule's own.
    pub annotations: Vec<Annotation>,
    pub delay: Duration,
    pub rule: Option<String>,
}

/// Dry-run result from [`Engine::explain`].
#[derive(Debug, Clone)]
pub struct Explanation {
    pub endpoint: Endpoint,
    pub model: String,
    pub input: String,
    pub outcome: Result<ResolvedResponse, InjectedError>,
    pub metrics: RunMetrics,
}

/// The response resolution engine.
///
/// Built once from an immutable [`BotConfig`] and shared by every request;
/// cloning is cheap.
///
/// # Example
/// ```
/// use mimic::{Engine, Message, config::BotConfig};
///
/// let config = BotConfig::from_yaml_str(r#"
/// variables: { bot_name: Bot }
/// rules:
///   - match: { endpoint: chat, contains: [hello] }
///     respond: { text: "Hi {{bot_name}}" }
/// "#).unwrap();
///
/// let engine = Engine::new(config);
/// let resolution = engine.resolve_chat("gpt-4o", &[Message::user("hello there")]);
/// assert_eq!(resolution.outcome.unwrap(), "Hi Bot");
/// ```
#[derive(Clone)]
pub struct Engine {
    resolver: Arc<engine::Resolver>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("rules", &self.config().rules.len()).finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine drawing randomness from the thread-local generator.
    pub fn new(config: BotConfig) -> Self {
        Self::with_random(config, Arc::new(ThreadRandom))
    }

    /// Engine with an injected random source (seeded or scripted in tests).
    pub fn with_random(config: BotConfig, random: Arc<dyn RandomSource>) -> Self {
        Engine { resolver: Arc::new(engine::Resolver::new(Arc::new(config), random)) }
    }

    pub fn config(&self) -> &BotConfig {
        self.resolver.config()
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.resolver.tools()
    }

    /// `{prefix}` followed by 16 random hex digits.
    pub fn new_id(&self, prefix: &str) -> String {
        self.resolver.new_id(prefix)
    }

    pub fn resolve_chat(&self, model: &str, messages: &[Message]) -> ChatResolution {
        let (resolution, metrics) = self.resolver.run_chat(model, messages);
        log_run(Endpoint::Chat, resolution.rule.as_deref(), &metrics);
        resolution
    }

    /// `Ok(None)`: no rule matched and the fallback is blank. Callers then use
    /// [`Engine::legacy_response`].
    pub fn resolve_responses(&self, model: &str, input: &Input) -> Result<Option<ResolvedResponse>, InjectedError> {
        let (outcome, metrics) = self.resolver.run_responses(model, input);
        let rule = outcome.as_ref().ok().and_then(|r| r.as_ref()).and_then(|r| r.rule.as_deref());
        log_run(Endpoint::Responses, rule, &metrics);
        outcome
    }

    /// Default generation driven by the tool types the request declared.
    pub fn legacy_response(&self, model: &str, input: &Input, requested_tools: &[String]) -> ResolvedResponse {
        let (resolved, metrics) = self.resolver.run_legacy(model, input, requested_tools);
        log_run(Endpoint::Responses, None, &metrics);
        resolved
    }

    /// Resolve `text` as a single user turn without serving it.
    ///
    /// On the responses surface an unresolved request goes through default
    /// generation, exactly as the server would answer it.
    pub fn explain(&self, endpoint: Endpoint, model: &str, text: &str) -> Explanation {
        let (outcome, metrics) = match endpoint {
            Endpoint::Chat => {
                let (resolution, metrics) = self.resolver.run_chat(model, &[Message::user(text)]);
                let ChatResolution { outcome, delay, rule } = resolution;
                let outcome = outcome.map(|text| ResolvedResponse {
                    text,
                    prefix_tools: Vec::new(),
                    annotations: Vec::new(),
                    delay,
                    rule,
                });
                (outcome, metrics)
            }
            Endpoint::Responses => {
                let input = Input::Text(text.to_string());
                match self.resolver.run_responses(model, &input) {
                    (Ok(Some(resolved)), metrics) => (Ok(resolved), metrics),
                    (Ok(None), mut metrics) => {
                        let (resolved, legacy) = self.resolver.run_legacy(model, &input, &[]);
                        metrics.tier = legacy.tier;
                        metrics.total += legacy.total;
                        (Ok(resolved), metrics)
                    }
                    (Err(err), metrics) => (Err(err), metrics),
                }
            }
        };

        Explanation { endpoint, model: model.to_string(), input: text.to_string(), outcome, metrics }
    }
}

fn log_run(endpoint: Endpoint, rule: Option<&str>, metrics: &RunMetrics) {
    tracing::debug!(
        endpoint = %endpoint,
        rule = rule.unwrap_or("-"),
        tier = metrics.tier.as_str(),
        considered = metrics.matcher.considered,
        gated_out = metrics.matcher.gated_out,
        superseded = metrics.matcher.superseded,
        elapsed_us = metrics.total.as_micros() as u64,
        "resolved"
    );
}
