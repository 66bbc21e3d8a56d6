//! Tool registry.
//!
//! Tools are canned side-outputs a rule can request with `use_tools`: each has
//! a call-type tag for the stub it produces, a status tag, and optionally a
//! message with citations.
//!
//! The registry is the configured one plus two built-ins (`web_search`,
//! `file_search`) inserted when the configuration does not define them. An
//! empty `enabled` list enables every registered tool.

use crate::config::{Annotation, CannedMessage, ToolDefinition, ToolsConfig};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashSet};

static BUILTIN_TOOLS: Lazy<Vec<(&'static str, ToolDefinition)>> = Lazy::new(|| {
    let citation = |kind: &str, title: &str, url: Option<&str>| Annotation {
        kind: kind.to_string(),
        title: title.to_string(),
        url: url.map(str::to_string),
    };

    vec![
        (
            "web_search",
            ToolDefinition {
                call_type: "web_search_call".to_string(),
                status: "completed".to_string(),
                message: Some(CannedMessage {
                    text: "Based on my web search, here are the latest developments: Mock search results show that AI \
                           technology continues to advance rapidly."
                        .to_string(),
                    annotations: vec![
                        citation(
                            "url_citation",
                            "AI Technology Advances in 2025",
                            Some("https://example.com/ai-advances-2025"),
                        ),
                        citation(
                            "url_citation",
                            "Language Model Improvements",
                            Some("https://example.com/language-models"),
                        ),
                    ],
                }),
            },
        ),
        (
            "file_search",
            ToolDefinition {
                call_type: "file_search_call".to_string(),
                status: "completed".to_string(),
                message: Some(CannedMessage {
                    text: "Based on the uploaded documents, I found relevant information about your query.".to_string(),
                    annotations: vec![
                        citation("file_citation", "Document Section 3.2", None),
                        citation("file_citation", "Appendix A - Examples", None),
                    ],
                }),
            },
        ),
    ]
});

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    enabled: HashSet<String>,
    registry: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        let mut registry = tools.registry.clone();
        for (name, definition) in BUILTIN_TOOLS.iter() {
            registry.entry((*name).to_string()).or_insert_with(|| definition.clone());
        }

        ToolRegistry { enabled: tools.enabled.iter().cloned().collect(), registry }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.is_empty() || self.enabled.contains(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.registry.get(name)
    }

    /// Definitions for `names` that are both enabled and registered, in request order.
    ///
    /// Unknown or disabled names are skipped silently.
    pub fn invoked<'a>(&'a self, names: &'a [String]) -> impl Iterator<Item = (&'a str, &'a ToolDefinition)> + 'a {
        names
            .iter()
            .filter(|name| self.is_enabled(name))
            .filter_map(|name| self.lookup(name).map(|def| (name.as_str(), def)))
    }

    /// Every registered tool with its enabled flag, sorted by name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ToolDefinition, bool)> {
        self.registry.iter().map(|(name, def)| (name.as_str(), def, self.is_enabled(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(call_type: &str) -> ToolDefinition {
        ToolDefinition { call_type: call_type.to_string(), status: "completed".to_string(), message: None }
    }

    #[test]
    fn builtins_are_injected_but_never_override() {
        let mut config = ToolsConfig::default();
        config.registry.insert("web_search".into(), custom("my_search_call"));

        let tools = ToolRegistry::from_config(&config);
        assert_eq!(tools.lookup("web_search").unwrap().call_type, "my_search_call");
        assert_eq!(tools.lookup("file_search").unwrap().call_type, "file_search_call");
        assert_eq!(tools.lookup("file_search").unwrap().message.as_ref().unwrap().annotations.len(), 2);
    }

    #[test]
    fn empty_enabled_set_enables_everything() {
        let tools = ToolRegistry::from_config(&ToolsConfig::default());
        assert!(tools.is_enabled("web_search"));
        assert!(tools.is_enabled("anything"));
        assert!(tools.entries().all(|(_, _, enabled)| enabled));
    }

    #[test]
    fn invoked_skips_disabled_and_unknown_names() {
        let mut config = ToolsConfig { enabled: vec!["web_search".into(), "ghost".into()], ..ToolsConfig::default() };
        config.registry.insert("calc".into(), custom("calculator_call"));
        let tools = ToolRegistry::from_config(&config);

        let names: Vec<String> = ["file_search", "ghost", "web_search", "calc"].map(String::from).to_vec();
        let invoked: Vec<&str> = tools.invoked(&names).map(|(name, _)| name).collect();
        assert_eq!(invoked, ["web_search"]);
    }
}
