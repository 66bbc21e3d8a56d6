//! Response composition.
//!
//! Matching picks a rule; this module turns the rule (or its absence) into the
//! outcome a surface serves. Each surface has its own ladder:
//!
//! ```text
//! chat:       error? ─▶ tool texts + rendered text ─▶ fallback ─▶ built-in replies
//! responses:  error? ─▶ message.text > text/choose > tool texts ─▶ fallback ─▶ (unresolved)
//! legacy:     requested web_search / file_search tool ─▶ keyword replies
//! ```
//!
//! Tool stubs and citations from `use_tools` are surfaced on the responses
//! surface whichever text wins. Chat only sees the tool texts.
//!
//! Resolution never fails: the only error value is an intentional
//! [`InjectedError`] carried by a matched rule.

use super::builtin;
use super::choice;
use super::compiled_rules::{CompiledRule, CompiledRules};
use super::matcher::{MatchQuery, RuleMatcher};
use super::metrics::{RunMetrics, Tier};
use super::random::{RandomSource, prefixed_id};
use super::template::TemplateContext;
use super::tools::ToolRegistry;
use crate::config::{Annotation, BotConfig, Respond};
use crate::{ChatResolution, Conversation, Endpoint, InjectedError, Input, Message, ResolvedResponse, ToolCallStub};
use std::sync::Arc;
use std::time::Instant;

/// Id prefix of every tool call stub.
pub(crate) const TOOL_CALL_PREFIX: &str = "ws_";

/// What `use_tools` contributed for one request.
#[derive(Debug, Default)]
struct ToolOutput {
    text: String,
    stubs: Vec<ToolCallStub>,
    annotations: Vec<Annotation>,
}

pub(crate) struct Resolver {
    config: Arc<BotConfig>,
    rules: CompiledRules,
    tools: ToolRegistry,
    random: Arc<dyn RandomSource>,
}

impl Resolver {
    pub fn new(config: Arc<BotConfig>, random: Arc<dyn RandomSource>) -> Self {
        let rules = CompiledRules::new(&config);
        let tools = ToolRegistry::from_config(&config.tools);
        tracing::debug!(rules = rules.len(), "compiled rule table");
        Resolver { config, rules, tools, random }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn new_id(&self, prefix: &str) -> String {
        prefixed_id(prefix, self.random.as_ref())
    }

    // --- Chat ----------------------------------------------------------------

    pub fn run_chat(&self, model: &str, messages: &[Message]) -> (ChatResolution, RunMetrics) {
        let started = Instant::now();
        let mut metrics = RunMetrics::default();
        let conversation = Conversation::from_messages(messages);
        let mut delay = self.config.chunk_delay();

        if let Some(rule) = self.evaluate(Endpoint::Chat, model, &conversation, &mut metrics) {
            delay = rule.delay;
            let respond = self.respond(rule);

            if let Some(error) = &respond.error {
                tracing::debug!(rule = %rule.id, status = error.status, code = %error.code, "injecting error");
                metrics.tier = Tier::Injected;
                metrics.total = started.elapsed();
                let outcome = Err(InjectedError(error.clone()));
                return (ChatResolution { outcome, delay, rule: Some(rule.id.clone()) }, metrics);
            }

            let ctx = self.context(model, &conversation);
            let tools = self.use_tools(respond, &ctx);
            let chosen = choice::pick(respond, self.random.as_ref());

            let text = if chosen.is_empty() {
                tools.text
            } else if tools.text.is_empty() {
                ctx.render(chosen)
            } else {
                format!("{}\n{}", tools.text, ctx.render(chosen))
            };

            if !text.is_empty() {
                metrics.tier = Tier::Rule;
                metrics.total = started.elapsed();
                return (ChatResolution { outcome: Ok(text), delay, rule: Some(rule.id.clone()) }, metrics);
            }
        }

        let text = match self.fallback(model, &conversation) {
            Some(text) => {
                metrics.tier = Tier::Fallback;
                text
            }
            None => {
                metrics.tier = Tier::Builtin;
                builtin::chat_reply(Conversation::last_message(messages), self.random.as_ref())
            }
        };

        metrics.total = started.elapsed();
        (ChatResolution { outcome: Ok(text), delay, rule: None }, metrics)
    }

    // --- Responses -----------------------------------------------------------

    /// `Ok(None)` means nothing configured applies; see [`Resolver::run_legacy`].
    pub fn run_responses(
        &self,
        model: &str,
        input: &Input,
    ) -> (Result<Option<ResolvedResponse>, InjectedError>, RunMetrics) {
        let started = Instant::now();
        let mut metrics = RunMetrics::default();
        let conversation = Conversation::from_input(input);

        let Some(rule) = self.evaluate(Endpoint::Responses, model, &conversation, &mut metrics) else {
            let resolved = self.fallback(model, &conversation).map(|text| ResolvedResponse {
                text,
                prefix_tools: Vec::new(),
                annotations: Vec::new(),
                delay: self.config.chunk_delay(),
                rule: None,
            });
            metrics.tier = if resolved.is_some() { Tier::Fallback } else { Tier::Unresolved };
            metrics.total = started.elapsed();
            return (Ok(resolved), metrics);
        };

        let respond = self.respond(rule);
        if let Some(error) = &respond.error {
            tracing::debug!(rule = %rule.id, status = error.status, code = %error.code, "injecting error");
            metrics.tier = Tier::Injected;
            metrics.total = started.elapsed();
            return (Err(InjectedError(error.clone())), metrics);
        }

        let ctx = self.context(model, &conversation);
        let ToolOutput { text: tool_text, stubs: mut prefix_tools, mut annotations } = self.use_tools(respond, &ctx);

        prefix_tools.extend(respond.tools.iter().map(|stub| ToolCallStub {
            id: self.new_id(TOOL_CALL_PREFIX),
            kind: stub.kind.clone(),
            status: stub.status.clone().unwrap_or_else(|| "completed".to_string()),
        }));
        annotations.extend(respond.message.annotations.iter().cloned());

        let chosen = choice::pick(respond, self.random.as_ref());
        let mut text = if !respond.message.text.is_empty() {
            ctx.render(&respond.message.text)
        } else if !chosen.is_empty() {
            ctx.render(chosen)
        } else {
            tool_text
        };

        // A rule that only adds stubs still answers with some text.
        if text.is_empty() {
            text = self
                .fallback(model, &conversation)
                .unwrap_or_else(|| builtin::responses_reply(&conversation.full_text, self.random.as_ref()));
        }

        metrics.tier = Tier::Rule;
        metrics.total = started.elapsed();
        let resolved = ResolvedResponse { text, prefix_tools, annotations, delay: rule.delay, rule: Some(rule.id.clone()) };
        (Ok(Some(resolved)), metrics)
    }

    /// Default generation for requests nothing configured applies to.
    ///
    /// A requested `web_search`/`web_search_preview` tool (else `file_search`)
    /// answers with that registry tool's stub and canned message; otherwise a
    /// keyword reply on the input text.
    pub fn run_legacy(&self, model: &str, input: &Input, requested_tools: &[String]) -> (ResolvedResponse, RunMetrics) {
        let started = Instant::now();
        let mut metrics = RunMetrics { tier: Tier::Legacy, ..RunMetrics::default() };
        let conversation = Conversation::from_input(input);

        let requested = |names: &[&str]| requested_tools.iter().any(|tool| names.contains(&tool.as_str()));
        let tool = if requested(&["web_search", "web_search_preview"]) {
            Some("web_search")
        } else if requested(&["file_search"]) {
            Some("file_search")
        } else {
            None
        };

        let mut resolved = ResolvedResponse {
            text: String::new(),
            prefix_tools: Vec::new(),
            annotations: Vec::new(),
            delay: self.config.chunk_delay(),
            rule: None,
        };

        match tool.and_then(|name| self.tools.lookup(name)) {
            Some(definition) => {
                let ctx = self.context(model, &conversation);
                resolved.prefix_tools.push(ToolCallStub {
                    id: self.new_id(TOOL_CALL_PREFIX),
                    kind: definition.call_type.clone(),
                    status: definition.status.clone(),
                });
                if let Some(message) = &definition.message {
                    resolved.text = ctx.render(&message.text);
                    resolved.annotations = message.annotations.clone();
                }
            }
            None => resolved.text = builtin::responses_reply(&conversation.full_text, self.random.as_ref()),
        }

        if resolved.text.is_empty() {
            resolved.text = builtin::responses_reply(&conversation.full_text, self.random.as_ref());
        }

        metrics.total = started.elapsed();
        (resolved, metrics)
    }

    // --- Shared steps --------------------------------------------------------

    fn evaluate(
        &self,
        endpoint: Endpoint,
        model: &str,
        conversation: &Conversation,
        metrics: &mut RunMetrics,
    ) -> Option<&CompiledRule> {
        let started = Instant::now();
        let query = MatchQuery {
            endpoint,
            model,
            role: &conversation.last_role,
            last_user: &conversation.last_user,
            full_text: &conversation.full_text,
        };
        let hit = RuleMatcher::new(&self.rules, self.random.as_ref()).evaluate(&query, &mut metrics.matcher);
        metrics.matching = started.elapsed();
        hit
    }

    fn respond(&self, rule: &CompiledRule) -> &Respond {
        &self.config.rules[rule.index].respond
    }

    fn context(&self, model: &str, conversation: &Conversation) -> TemplateContext {
        TemplateContext::for_request(model, conversation, &self.config.variables)
    }

    /// Rendered fallback text, `None` when the fallback is blank.
    fn fallback(&self, model: &str, conversation: &Conversation) -> Option<String> {
        let text = choice::pick(&self.config.fallback, self.random.as_ref());
        if text.is_empty() {
            return None;
        }
        Some(self.context(model, conversation).render(text))
    }

    /// Stubs, newline-joined rendered texts and citations of the enabled tools in `use_tools`.
    fn use_tools(&self, respond: &Respond, ctx: &TemplateContext) -> ToolOutput {
        let mut output = ToolOutput::default();

        for (name, definition) in self.tools.invoked(&respond.use_tools) {
            tracing::trace!(tool = name, call_type = %definition.call_type, "invoking tool");
            output.stubs.push(ToolCallStub {
                id: self.new_id(TOOL_CALL_PREFIX),
                kind: definition.call_type.clone(),
                status: definition.status.clone(),
            });

            let Some(message) = &definition.message else { continue };
            let text = ctx.render(&message.text);
            if !text.is_empty() {
                if !output.text.is_empty() {
                    output.text.push('\n');
                }
                output.text.push_str(&text);
            }
            output.annotations.extend(message.annotations.iter().cloned());
        }

        output
    }
}
