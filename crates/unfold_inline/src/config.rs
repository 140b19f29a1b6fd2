//! Inliner configuration

use serde::{Deserialize, Serialize};

/// Configuration for the inline pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineConfig {
    /// Maximum nesting of expansions produced while re-visiting an expansion.
    pub max_depth: usize,
    /// Label prefix for callees without a simple name, e.g. called lambda literals.
    pub fallback_label_prefix: String,
    /// Base name of the variable holding a side-effecting receiver.
    pub this_alias: String,
    /// Drop breaks that only fall through to the end of their label.
    pub remove_tail_breaks: bool,
    /// Fold a lone trailing result assignment into the result expression.
    pub collapse_single_return: bool,
    /// Copy closure and mapping classes whose lifetime crosses an expansion.
    pub regenerate_closures: bool,
}

impl Default for InlineConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            fallback_label_prefix: "inline$".to_string(),
            this_alias: "$this".to_string(),
            remove_tail_breaks: true,
            collapse_single_return: true,
            regenerate_closures: true,
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl InlineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(depth) = std::env::var("UNFOLD_MAX_DEPTH")
            && let Ok(depth) = depth.parse::<usize>()
        {
            config.max_depth = depth;
        }

        if let Ok(prefix) = std::env::var("UNFOLD_LABEL_PREFIX")
            && !prefix.is_empty()
        {
            config.fallback_label_prefix = prefix;
        }

        if let Ok(peephole) = std::env::var("UNFOLD_PEEPHOLE")
            && let Some(enabled) = parse_switch(&peephole)
        {
            config.remove_tail_breaks = enabled;
            config.collapse_single_return = enabled;
        }

        if let Ok(regenerate) = std::env::var("UNFOLD_REGENERATE")
            && let Some(enabled) = parse_switch(&regenerate)
        {
            config.regenerate_closures = enabled;
        }

        config
    }

    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }
}
