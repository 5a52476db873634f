//! Configuration for the chatsh binary.
//!
//! Built-in defaults are overlaid by an optional YAML file at
//! `~/.config/chatsh.yaml`.  Every key in the file is optional:
//!
//! ```yaml
//! default_model: C
//! max_tokens: 4096
//! shell: /bin/bash
//! history_dir: /tmp/chatsh_history
//! models:
//!   r:
//!     model: deepseek-reasoner
//!     vendor: deepseek
//! base_urls:
//!   openai: http://localhost:8080/v1/
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::chat::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::error::{Error, Result};
use crate::executor::DEFAULT_SHELL;
use crate::models::{DEFAULT_SHORTCODE, ModelCatalog, ModelSpec, Vendor};
use crate::secrets::SecretStore;

/// Name of the configuration file under `~/.config`.
pub const CONFIG_FILE_NAME: &str = "chatsh.yaml";

/// The on-disk configuration file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Shortcode or model id used when none is given on the command line.
    pub default_model: Option<String>,
    /// Reply budget.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Whether to stream replies.
    pub stream: Option<bool>,
    /// Whether to mark the system prompt cacheable.
    pub system_cacheable: Option<bool>,
    /// Shell program used to run scripts.
    pub shell: Option<String>,
    /// Where conversation logs are written.
    pub history_dir: Option<PathBuf>,
    /// Where `{vendor}.token` files are read from.
    pub secrets_dir: Option<PathBuf>,
    /// Whether to emit ANSI styling.
    pub use_color: Option<bool>,
    /// Extra or overriding catalog entries.
    #[serde(default)]
    pub models: BTreeMap<String, ModelSpec>,
    /// Per-vendor API base URLs.
    #[serde(default)]
    pub base_urls: BTreeMap<Vendor, String>,
}

impl ConfigFile {
    /// Reads and parses `path`.  A malformed file is a fatal error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        Self::from_yaml(&contents)
            .map_err(|err| Error::configuration(format!("{}: {err}", path.display())))
    }

    /// Parses YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|err| Error::configuration(err.to_string()))
    }
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatshConfig {
    /// Shortcode or model id used when none is given on the command line.
    pub default_model: String,
    /// Reply budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to stream replies.
    pub stream: bool,
    /// Whether to mark the system prompt cacheable.
    pub system_cacheable: bool,
    /// Shell program used to run scripts.
    pub shell: String,
    /// Where conversation logs are written.
    pub history_dir: PathBuf,
    /// Where `{vendor}.token` files are read from.
    pub secrets_dir: PathBuf,
    /// Whether to emit ANSI styling.
    pub use_color: bool,
    /// Shortcodes and the models they name.
    pub catalog: ModelCatalog,
    /// Per-vendor API base URL overrides.
    pub base_urls: BTreeMap<Vendor, String>,
}

impl ChatshConfig {
    /// Defaults rooted at `home`.
    ///
    /// - Model: `c`
    /// - Max tokens: 8192
    /// - Temperature: 0.0
    /// - Streaming and system prompt caching: enabled
    /// - Shell: `sh`
    /// - History: `~/.ai/chatsh_history`
    /// - Secrets: `~/.config`
    pub fn for_home(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref();
        Self {
            default_model: DEFAULT_SHORTCODE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            stream: true,
            system_cacheable: true,
            shell: DEFAULT_SHELL.to_string(),
            history_dir: home.join(".ai").join("chatsh_history"),
            secrets_dir: home.join(".config"),
            use_color: true,
            catalog: ModelCatalog::default(),
            base_urls: BTreeMap::new(),
        }
    }

    /// Defaults for the current user, overlaid by `~/.config/chatsh.yaml` when
    /// it exists.
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::configuration("could not determine the home directory"))?;
        let config = Self::for_home(&home);
        let path = home.join(".config").join(CONFIG_FILE_NAME);
        if path.exists() {
            Ok(config.overlay(ConfigFile::from_file(&path)?))
        } else {
            Ok(config)
        }
    }

    /// Applies every key present in `file`.
    pub fn overlay(mut self, file: ConfigFile) -> Self {
        if let Some(default_model) = file.default_model {
            self.default_model = default_model;
        }
        if let Some(max_tokens) = file.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = file.temperature {
            self.temperature = temperature;
        }
        if let Some(stream) = file.stream {
            self.stream = stream;
        }
        if let Some(system_cacheable) = file.system_cacheable {
            self.system_cacheable = system_cacheable;
        }
        if let Some(shell) = file.shell {
            self.shell = shell;
        }
        if let Some(history_dir) = file.history_dir {
            self.history_dir = history_dir;
        }
        if let Some(secrets_dir) = file.secrets_dir {
            self.secrets_dir = secrets_dir;
        }
        if let Some(use_color) = file.use_color {
            self.use_color = use_color;
        }
        for (shortcode, spec) in file.models {
            self.catalog.insert(shortcode, spec);
        }
        self.base_urls.extend(file.base_urls);
        self
    }

    /// Sets the default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Sets the reply budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Enables or disables streaming.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Enables or disables system prompt caching.
    pub fn with_system_cacheable(mut self, system_cacheable: bool) -> Self {
        self.system_cacheable = system_cacheable;
        self
    }

    /// Sets the shell program.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Sets the history directory.
    pub fn with_history_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history_dir = dir.into();
        self
    }

    /// Sets the secrets directory.
    pub fn with_secrets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.secrets_dir = dir.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Overrides the base URL for `vendor`.
    pub fn with_base_url(mut self, vendor: Vendor, url: impl Into<String>) -> Self {
        self.base_urls.insert(vendor, url.into());
        self
    }

    /// The secret store rooted at the configured directory.
    pub fn secrets(&self) -> SecretStore {
        SecretStore::new(&self.secrets_dir)
    }

    /// The configured base URL for `vendor`, if overridden.
    pub fn base_url(&self, vendor: Vendor) -> Option<&str> {
        self.base_urls.get(&vendor).map(String::as_str)
    }

    /// Resolves `name`, or the default model when `None`.
    pub fn resolve_model(&self, name: Option<&str>) -> Result<ModelSpec> {
        self.catalog
            .resolve(name.unwrap_or(self.default_model.as_str()))
    }
}

/// Positional command-line arguments: `[model-shortcode] [initial-message...]`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChatshArgs {
    /// Shortcode or model id.
    pub model: Option<String>,
    /// Message sent before the first prompt.
    pub initial_message: Option<String>,
}

impl ChatshArgs {
    /// Parses arguments, excluding the program name.
    ///
    /// Everything after the model is joined with single spaces.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut args = args.into_iter();
        let model = args.next();
        let rest: Vec<String> = args.collect();
        let initial_message = if rest.is_empty() {
            None
        } else {
            Some(rest.join(" "))
        };
        Self {
            model,
            initial_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> ChatshArgs {
        ChatshArgs::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults() {
        let config = ChatshConfig::for_home("/home/user");
        assert_eq!(config.default_model, "c");
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.temperature, 0.0);
        assert!(config.stream);
        assert!(config.system_cacheable);
        assert_eq!(config.shell, "sh");
        assert_eq!(
            config.history_dir,
            PathBuf::from("/home/user/.ai/chatsh_history")
        );
        assert_eq!(
            config.secrets().token_path(Vendor::Gemini),
            PathBuf::from("/home/user/.config/gemini.token")
        );
        assert_eq!(config.base_url(Vendor::OpenAi), None);
    }

    #[test]
    fn overlay_replaces_only_present_keys() {
        let file = ConfigFile::from_yaml(
            "default_model: C\nshell: /bin/bash\nuse_color: false\n\
             models:\n  r:\n    model: deepseek-reasoner\n    vendor: deepseek\n\
             base_urls:\n  openai: http://localhost:8080/v1/\n",
        )
        .unwrap();
        let config = ChatshConfig::for_home("/home/user").overlay(file);
        assert_eq!(config.default_model, "C");
        assert_eq!(config.shell, "/bin/bash");
        assert!(!config.use_color);
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(
            config.base_url(Vendor::OpenAi),
            Some("http://localhost:8080/v1/")
        );
        let spec = config.resolve_model(Some("r")).unwrap();
        assert_eq!(spec.vendor, Vendor::DeepSeek);
        assert_eq!(
            config.resolve_model(None).unwrap().model,
            "claude-3-5-sonnet-latest"
        );
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(ConfigFile::from_yaml("\n").unwrap(), ConfigFile::default());
    }

    #[test]
    fn malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "max_tokens: lots\n").unwrap();
        let err = ConfigFile::from_file(&path).unwrap_err();
        assert!(err.is_fatal());

        fs::write(&path, "colour: true\n").unwrap();
        assert!(ConfigFile::from_file(&path).unwrap_err().is_fatal());
    }

    #[test]
    fn builders() {
        let config = ChatshConfig::for_home("/h")
            .with_default_model("g")
            .with_max_tokens(100)
            .with_temperature(0.5)
            .with_stream(false)
            .with_system_cacheable(false)
            .with_shell("bash")
            .with_history_dir("/tmp/h")
            .with_secrets_dir("/tmp/s")
            .without_color()
            .with_base_url(Vendor::Anthropic, "http://proxy/");
        assert_eq!(config.resolve_model(None).unwrap().vendor, Vendor::OpenAi);
        assert_eq!(config.max_tokens, 100);
        assert!(!config.stream);
        assert!(!config.use_color);
        assert_eq!(config.secrets().dir(), Path::new("/tmp/s"));
        assert_eq!(config.base_url(Vendor::Anthropic), Some("http://proxy/"));
    }

    #[test]
    fn args_are_positional() {
        assert_eq!(args(&[]), ChatshArgs::default());
        assert_eq!(
            args(&["g"]),
            ChatshArgs {
                model: Some("g".to_string()),
                initial_message: None,
            }
        );
        assert_eq!(
            args(&["c", "list", "my", "files"]),
            ChatshArgs {
                model: Some("c".to_string()),
                initial_message: Some("list my files".to_string()),
            }
        );
    }
}
