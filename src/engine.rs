//! Response resolution engine.
//!
//! This module is the core of the mock: given a request's endpoint, model,
//! role and text, it decides which configured rule applies and composes the
//! reply. It is split into focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! ```text
//! BotConfig.rules ──┐
//!                   │  CompiledRules::new        (compiled_rules.rs)
//!                   └──────────────┬─────────────
//!                                  │
//! Conversation ── MatchQuery ──────┼─ RuleMatcher::evaluate (matcher.rs)
//!                                  │    - structural filters, in order
//!                                  │    - probability gate
//!                                  │    - first terminal match wins,
//!                                  │      `continue` lets later rules override
//!                                  v
//!                       Resolver (resolve.rs)
//!                         - injected error short-circuit
//!                         - ToolRegistry aggregation      (tools.rs)
//!                         - WeightedChoice                (choice.rs)
//!                         - TemplateContext::render       (template.rs)
//!                         - fallback, then built-in tier  (builtin.rs)
//!                                  │
//!                                  v
//!                text | tool stubs | annotations | delay   or   error
//!                                  │
//!                                  v
//!                       delivery::stream (delivery.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `compiled_rules.rs`: compiles each rule's filters once (lowercased
//!   substrings, regex, model set, delay) so evaluation does no allocation
//!   per rule.
//! - `matcher.rs`: ordered evaluation with the `continue` override semantics.
//! - `resolve.rs`: per-surface composition (chat, responses, legacy default).
//! - `template.rs`: single-pass `{{name}}` substitution.
//! - `choice.rs`: weighted text selection.
//! - `tools.rs`: tool registry with built-in `web_search` / `file_search`.
//! - `builtin.rs`: canned replies used when nothing is configured.
//! - `delivery.rs`: word chunking and paced frame streams.
//! - `random.rs`: the injectable randomness seam.
//! - `metrics.rs`: per-run timing and match counters.
//!
//! ## Debugging
//!
//! Rule evaluation traces are emitted at `debug` level under the
//! `mimic::engine` target, e.g. `RUST_LOG=mimic::engine=debug`.

#[path = "engine/builtin.rs"]
mod builtin;
#[path = "engine/choice.rs"]
mod choice;
#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/delivery.rs"]
mod delivery;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/random.rs"]
mod random;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/template.rs"]
mod template;
#[path = "engine/tools.rs"]
mod tools;


pub use delivery::{Chunks, Frame, chunks, frames, stream};
pub use metrics::{MatchMetrics, RunMetrics, Tier};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub(crate) use resolve::Resolver;
pub use template::TemplateContext;
pub use tools::ToolRegistry;
