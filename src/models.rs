//! Model shortcodes and the vendors that serve them.
//!
//! Every catalog entry carries an explicit [`Vendor`] tag, so the backend is
//! chosen once at startup.  [`Vendor::infer`] keeps the historical
//! model-name prefix table around for ids that are not in the catalog.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Shortcode used when none is given on the command line.
pub const DEFAULT_SHORTCODE: &str = "c";

/// A chat vendor.  Each vendor has exactly one backend implementation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API.
    OpenAi,
    /// DeepSeek, an OpenAI-compatible API.
    DeepSeek,
    /// OpenRouter, an OpenAI-compatible API.
    OpenRouter,
    /// Google Gemini API.
    Gemini,
}

impl Vendor {
    /// All vendors, in a stable order.
    pub const ALL: [Vendor; 5] = [
        Vendor::Anthropic,
        Vendor::OpenAi,
        Vendor::DeepSeek,
        Vendor::OpenRouter,
        Vendor::Gemini,
    ];

    /// The name used for this vendor's token file and in messages.
    pub fn name(self) -> &'static str {
        match self {
            Vendor::Anthropic => "anthropic",
            Vendor::OpenAi => "openai",
            Vendor::DeepSeek => "deepseek",
            Vendor::OpenRouter => "openrouter",
            Vendor::Gemini => "gemini",
        }
    }

    /// The API base URL used unless the configuration overrides it.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Vendor::Anthropic => "https://api.anthropic.com/v1/",
            Vendor::OpenAi => "https://api.openai.com/v1/",
            Vendor::DeepSeek => "https://api.deepseek.com/v1/",
            Vendor::OpenRouter => "https://openrouter.ai/api/v1/",
            Vendor::Gemini => "https://generativelanguage.googleapis.com/v1beta/",
        }
    }

    /// Infers the vendor from a full model id.
    ///
    /// This is a compatibility shim for ids that do not appear in the catalog;
    /// catalog entries always carry an explicit vendor.
    pub fn infer(model: &str) -> Option<Vendor> {
        const PREFIXES: &[(&str, Vendor)] = &[
            ("gpt", Vendor::OpenAi),
            ("o1", Vendor::OpenAi),
            ("chatgpt", Vendor::OpenAi),
            ("deepseek", Vendor::DeepSeek),
            ("claude", Vendor::Anthropic),
            ("meta", Vendor::OpenRouter),
            ("gemini", Vendor::Gemini),
        ];
        PREFIXES
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, vendor)| *vendor)
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Vendor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Vendor::ALL
            .into_iter()
            .find(|vendor| vendor.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::configuration(format!("unknown vendor: {s}")))
    }
}

/// A resolved model: its id, the vendor serving it, and its quirks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Full vendor model identifier.
    pub model: String,
    /// Vendor serving this model.
    pub vendor: Vendor,
    /// Whether the model accepts a system prompt.
    #[serde(default = "default_true")]
    pub system_prompt: bool,
}

fn default_true() -> bool {
    true
}

impl ModelSpec {
    /// Creates an entry for a model that accepts system prompts.
    pub fn new(model: impl Into<String>, vendor: Vendor) -> Self {
        Self {
            model: model.into(),
            vendor,
            system_prompt: true,
        }
    }

    /// Marks the model as rejecting system prompts.
    pub fn without_system_prompt(mut self) -> Self {
        self.system_prompt = false;
        self
    }
}

/// Map of shortcodes to model specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    entries: BTreeMap<String, ModelSpec>,
}

impl ModelCatalog {
    /// Creates an empty catalog.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Adds or replaces the entry for `shortcode`.
    pub fn insert(&mut self, shortcode: impl Into<String>, spec: ModelSpec) {
        self.entries.insert(shortcode.into(), spec);
    }

    /// Returns the entry for `shortcode`, if any.
    pub fn get(&self, shortcode: &str) -> Option<&ModelSpec> {
        self.entries.get(shortcode)
    }

    /// Returns the full model id for a shortcode, or the input unchanged.
    pub fn model_id<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).map(|spec| spec.model.as_str()).unwrap_or(name)
    }

    /// Resolves a shortcode or full model id into a [`ModelSpec`].
    ///
    /// Shortcodes use their explicit vendor tag.  Full ids that match a
    /// catalog entry's model inherit that entry; anything else goes through
    /// [`Vendor::infer`].
    pub fn resolve(&self, name: &str) -> Result<ModelSpec> {
        if let Some(spec) = self.get(name) {
            return Ok(spec.clone());
        }
        if let Some(spec) = self.entries.values().find(|spec| spec.model == name) {
            return Ok(spec.clone());
        }
        let vendor = Vendor::infer(name).ok_or_else(|| Error::unsupported_model(name))?;
        let spec = ModelSpec::new(name, vendor);
        if is_reasoning_model(name) {
            Ok(spec.without_system_prompt())
        } else {
            Ok(spec)
        }
    }

    /// Iterates over `(shortcode, spec)` pairs in shortcode order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelSpec)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.insert("gm", ModelSpec::new("gpt-4o-mini", Vendor::OpenAi));
        catalog.insert("g", ModelSpec::new("gpt-4o-2024-11-20", Vendor::OpenAi));
        catalog.insert(
            "om",
            ModelSpec::new("o1-mini", Vendor::OpenAi).without_system_prompt(),
        );
        catalog.insert(
            "o",
            ModelSpec::new("o1", Vendor::OpenAi).without_system_prompt(),
        );
        catalog.insert(
            "cm",
            ModelSpec::new("claude-3-5-haiku-20241022", Vendor::Anthropic),
        );
        catalog.insert(
            "C",
            ModelSpec::new("claude-3-5-sonnet-latest", Vendor::Anthropic),
        );
        catalog.insert(
            "c",
            ModelSpec::new("claude-3-5-sonnet-20240620", Vendor::Anthropic),
        );
        catalog.insert("d", ModelSpec::new("deepseek-chat", Vendor::DeepSeek));
        catalog.insert(
            "lm",
            ModelSpec::new("meta-llama/llama-3.2-8b-instruct", Vendor::OpenRouter),
        );
        catalog.insert(
            "l",
            ModelSpec::new("meta-llama/llama-3.3-70b-instruct", Vendor::OpenRouter),
        );
        catalog.insert(
            "L",
            ModelSpec::new("meta-llama/llama-3.2-405b-instruct", Vendor::OpenRouter),
        );
        catalog.insert("i", ModelSpec::new("gemini-2.0-flash-exp", Vendor::Gemini));
        catalog.insert("I", ModelSpec::new("gemini-exp-1206", Vendor::Gemini));
        catalog
    }
}

/// Returns true for OpenAI reasoning models, which reject system messages,
/// streaming, and custom temperatures.
pub fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("o1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shortcode_resolves_to_claude() {
        let catalog = ModelCatalog::default();
        let spec = catalog.resolve(DEFAULT_SHORTCODE).unwrap();
        assert_eq!(spec.model, "claude-3-5-sonnet-20240620");
        assert_eq!(spec.vendor, Vendor::Anthropic);
        assert!(spec.system_prompt);
    }

    #[test]
    fn shortcodes_are_case_sensitive() {
        let catalog = ModelCatalog::default();
        assert_eq!(catalog.model_id("C"), "claude-3-5-sonnet-latest");
        assert_eq!(catalog.model_id("c"), "claude-3-5-sonnet-20240620");
        assert_eq!(catalog.model_id("L"), "meta-llama/llama-3.2-405b-instruct");
        assert_eq!(catalog.model_id("l"), "meta-llama/llama-3.3-70b-instruct");
    }

    #[test]
    fn o1_shortcodes_reject_system_prompts() {
        let catalog = ModelCatalog::default();
        assert!(!catalog.resolve("o").unwrap().system_prompt);
        assert!(!catalog.resolve("om").unwrap().system_prompt);
        assert!(catalog.resolve("g").unwrap().system_prompt);
    }

    #[test]
    fn full_ids_use_catalog_entry_first() {
        let catalog = ModelCatalog::default();
        let spec = catalog.resolve("deepseek-chat").unwrap();
        assert_eq!(spec.vendor, Vendor::DeepSeek);
    }

    #[test]
    fn unknown_ids_fall_back_to_prefix_table() {
        let catalog = ModelCatalog::default();
        assert_eq!(
            catalog.resolve("claude-sonnet-4-0").unwrap().vendor,
            Vendor::Anthropic
        );
        assert_eq!(catalog.resolve("chatgpt-4o-latest").unwrap().vendor, Vendor::OpenAi);
        assert_eq!(
            catalog.resolve("meta-llama/llama-3.1-8b").unwrap().vendor,
            Vendor::OpenRouter
        );
        assert_eq!(catalog.resolve("gemini-1.5-pro").unwrap().vendor, Vendor::Gemini);
        assert!(!catalog.resolve("o1-preview").unwrap().system_prompt);
    }

    #[test]
    fn unsupported_model_is_an_error() {
        let catalog = ModelCatalog::default();
        let err = catalog.resolve("mistral-large").unwrap_err();
        assert!(matches!(err, Error::UnsupportedModel { .. }));
        assert_eq!(err.to_string(), "Unsupported model: mistral-large");
    }

    #[test]
    fn vendor_round_trips_through_name() {
        for vendor in Vendor::ALL {
            assert_eq!(vendor.name().parse::<Vendor>().unwrap(), vendor);
        }
        assert!("cohere".parse::<Vendor>().is_err());
    }

    #[test]
    fn vendor_deserializes_from_lowercase() {
        let spec: ModelSpec =
            serde_yaml::from_str("model: deepseek-reasoner\nvendor: deepseek\n").unwrap();
        assert_eq!(spec.vendor, Vendor::DeepSeek);
        assert!(spec.system_prompt);
    }
}
