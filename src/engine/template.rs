//! `{{name}}` placeholder substitution.
//!
//! The context is built fresh per request from four built-ins (`model`,
//! `last_user_message`, `input_text`, `timestamp`) and then overlaid with the
//! configured `variables`, so operators can shadow any built-in.
//!
//! Rendering is a single left-to-right pass: a substituted value is never
//! scanned again, and placeholders without a matching key are copied through
//! untouched.

use crate::Conversation;
use chrono::{Local, SecondsFormat};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: HashMap<String, String>,
}

impl TemplateContext {
    /// Built-ins for this request, stamped with the current local time.
    pub fn for_request(model: &str, conversation: &Conversation, variables: &BTreeMap<String, String>) -> Self {
        let timestamp = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        Self::with_timestamp(model, conversation, timestamp, variables)
    }

    pub fn with_timestamp(
        model: &str,
        conversation: &Conversation,
        timestamp: String,
        variables: &BTreeMap<String, String>,
    ) -> Self {
        let mut vars = HashMap::with_capacity(4 + variables.len());
        vars.insert("model".to_string(), model.to_string());
        vars.insert("last_user_message".to_string(), conversation.last_user.clone());
        vars.insert("input_text".to_string(), conversation.full_text.clone());
        vars.insert("timestamp".to_string(), timestamp);
        // Configuration wins over built-ins.
        vars.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        TemplateContext { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let hit = after.find("}}").and_then(|close| self.get(&after[..close]).map(|value| (close, value)));
            match hit {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 2..];
                }
                None => {
                    out.push_str("{{");
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}
