//! Localized user-facing strings for orchestrator-originated messages.

use std::collections::BTreeMap;

/// Well-known catalog keys consumed by the agent loop.
pub mod message_keys {
    /// Notice sent when the per-turn iteration cap is hit. Arg 0: the cap.
    pub const ITERATION_LIMIT: &str = "system.iteration.limit";

    /// Wrapper around an LLM-interpreted error summary. Arg 0: the summary.
    pub const ERROR_FEEDBACK: &str = "system.error.feedback";

    /// Last-resort feedback when nothing else could be produced.
    pub const GENERIC_FEEDBACK: &str = "system.error.generic.feedback";
}

/// Trait contract for `MessageCatalog` behavior.
///
/// Injected into the orchestrator so tests can substitute fixed texts.
pub trait MessageCatalog: Send + Sync {
    /// Resolves a template by key and substitutes positional `{0}`-style
    /// placeholders. Unknown keys resolve to the key itself.
    fn message(&self, key: &str, args: &[&str]) -> String;
}

/// In-memory catalog with English defaults for the orchestrator's keys.
pub struct StaticMessageCatalog {
    templates: BTreeMap<String, String>,
}

impl StaticMessageCatalog {
    pub fn new() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            message_keys::ITERATION_LIMIT.to_string(),
            "I stopped after {0} processing rounds without reaching a final answer. \
             Please try rephrasing your request."
                .to_string(),
        );
        templates.insert(
            message_keys::ERROR_FEEDBACK.to_string(),
            "I ran into a problem: {0}".to_string(),
        );
        templates.insert(
            message_keys::GENERIC_FEEDBACK.to_string(),
            "Something went wrong while processing your message. Please try again.".to_string(),
        );
        Self { templates }
    }

    /// Overrides or adds a template, e.g. for another locale.
    pub fn with_template(mut self, key: &str, template: impl Into<String>) -> Self {
        self.templates.insert(key.to_string(), template.into());
        self
    }
}

impl Default for StaticMessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCatalog for StaticMessageCatalog {
    fn message(&self, key: &str, args: &[&str]) -> String {
        let Some(template) = self.templates.get(key) else {
            return key.to_string();
        };
        format_template(template, args)
    }
}

fn format_template(template: &str, args: &[&str]) -> String {
    let mut rendered = template.to_string();
    for (index, arg) in args.iter().enumerate() {
        rendered = rendered.replace(&format!("{{{index}}}"), arg);
    }
    rendered
}
