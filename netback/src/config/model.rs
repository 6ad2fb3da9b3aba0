//! Model descriptors: the protocol profile shared by every device of a kind.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::channel::buffer::DEFAULT_SEARCH_DEPTH;
use crate::channel::{InterruptRule, PromptPattern, SecretRule};
use crate::error::ConfigError;

/// A compiled model definition.
///
/// Every pattern is compiled when the model is built, so a model that
/// exists is known to be usable.
#[derive(Debug, Clone)]
pub struct Model {
    /// Model name (e.g. "ios", "junos").
    pub name: String,

    /// Pattern that marks the end of a command's output.
    pub prompt: PromptPattern,

    /// Prefix for commented lines; empty disables annotation.
    pub comment: String,

    /// Commands to run once the first prompt is seen.
    pub post_login: Vec<String>,

    /// Command sent before the session is closed.
    pub pre_logout: Option<String>,

    /// Rules checked on every chunk while reading.
    pub expect: Vec<InterruptRule>,

    /// Redaction rules for captured output.
    pub secrets: Vec<SecretRule>,

    /// Commands whose whole output is commented.
    pub comments: Vec<String>,

    /// Commands whose output is the backup itself.
    pub commands: Vec<String>,

    /// Drop ANSI/VT escape sequences from the stream.
    pub strip_ansi: bool,

    /// Bytes of buffer tail searched for the prompt.
    pub search_depth: usize,
}

impl Model {
    /// Create a model with a prompt pattern and nothing else.
    pub fn new(name: impl Into<String>, prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            prompt: PromptPattern::new(prompt)?,
            comment: String::new(),
            post_login: vec![],
            pre_logout: None,
            expect: vec![],
            secrets: vec![],
            comments: vec![],
            commands: vec![],
            strip_ansi: true,
            search_depth: DEFAULT_SEARCH_DEPTH,
        })
    }

    pub fn with_comment(mut self, prefix: impl Into<String>) -> Self {
        self.comment = prefix.into();
        self
    }

    pub fn with_post_login(mut self, command: impl Into<String>) -> Self {
        self.post_login.push(command.into());
        self
    }

    pub fn with_pre_logout(mut self, command: impl Into<String>) -> Self {
        self.pre_logout = Some(command.into());
        self
    }

    pub fn with_expect(mut self, rule: InterruptRule) -> Self {
        self.expect.push(rule);
        self
    }

    pub fn with_secret(mut self, rule: SecretRule) -> Self {
        self.secrets.push(rule);
        self
    }

    /// Add an annotation command (output fully commented).
    pub fn with_annotation(mut self, command: impl Into<String>) -> Self {
        self.comments.push(command.into());
        self
    }

    /// Add a capture command (output is the backup).
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn with_strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }

    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// Compile a model from its file representation.
    fn compile(name: &str, spec: ModelSpec) -> Result<Self, ConfigError> {
        if spec.prompt.is_empty() {
            return Err(ConfigError::MissingPrompt {
                model: name.to_string(),
            });
        }

        let invalid = |field: String, pattern: &str| {
            let model = name.to_string();
            let pattern = pattern.to_string();
            move |source| ConfigError::InvalidPattern {
                model,
                field,
                pattern,
                source,
            }
        };

        let mut model = Model::new(name, &spec.prompt)
            .map_err(invalid("prompt".to_string(), &spec.prompt))?;

        for (i, rule) in spec.expect.into_iter().enumerate() {
            let mut compiled = InterruptRule::new(&rule.pattern)
                .map_err(invalid(format!("expect[{i}]"), &rule.pattern))?;
            if let Some(send) = rule.send {
                compiled = compiled.with_send(send);
            }
            if let Some(replace) = rule.replace {
                compiled = compiled.with_replace(replace);
            }
            model.expect.push(compiled);
        }

        for (i, rule) in spec.secrets.into_iter().enumerate() {
            let compiled = SecretRule::new(&rule.pattern, rule.replace)
                .map_err(invalid(format!("secrets[{i}]"), &rule.pattern))?;
            model.secrets.push(compiled);
        }

        if spec.commands.is_empty() {
            return Err(ConfigError::NoCommands {
                model: name.to_string(),
            });
        }

        model.comment = spec.comment;
        model.post_login = spec.connection.post_login;
        model.pre_logout = spec.connection.pre_logout.filter(|c| !c.is_empty());
        model.comments = spec.comments;
        model.commands = spec.commands;
        if let Some(strip) = spec.strip_ansi {
            model.strip_ansi = strip;
        }
        if let Some(depth) = spec.search_depth {
            model.search_depth = depth;
        }
        Ok(model)
    }
}

/// The set of loaded models, in declaration order.
#[derive(Debug, Default, Clone)]
pub struct ModelSet {
    models: IndexMap<String, Arc<Model>>,
}

impl ModelSet {
    /// Create a new empty set.
    pub fn new() -> Self {
        Self {
            models: IndexMap::new(),
        }
    }

    /// Load and validate a model file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    /// Parse and validate model file contents.
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        let file: ModelFile = serde_yaml::from_str(data).map_err(|source| ConfigError::Parse {
            what: "model file".to_string(),
            source,
        })?;

        if file.models.is_empty() {
            return Err(ConfigError::NoModels);
        }

        let mut set = Self::new();
        for (name, spec) in file.models {
            let model = Model::compile(&name, spec)?;
            debug!(
                "loaded model {:?}: {} expect, {} secrets, {} commands",
                name,
                model.expect.len(),
                model.secrets.len(),
                model.commands.len()
            );
            set.insert(model);
        }
        Ok(set)
    }

    /// Add or replace a model.
    pub fn insert(&mut self, model: Model) {
        self.models.insert(model.name.clone(), Arc::new(model));
    }

    /// Get a model by name.
    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// List model names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.models.keys()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default)]
    models: IndexMap<String, ModelSpec>,
}

#[derive(Debug, Deserialize)]
struct ModelSpec {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    connection: ConnectionSpec,
    #[serde(default)]
    expect: Vec<ExpectSpec>,
    #[serde(default)]
    secrets: Vec<SecretSpec>,
    #[serde(default)]
    comments: Vec<String>,
    #[serde(default)]
    commands: Vec<String>,
    strip_ansi: Option<bool>,
    search_depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectionSpec {
    #[serde(default)]
    post_login: Vec<String>,
    pre_logout: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpectSpec {
    pattern: String,
    send: Option<String>,
    replace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretSpec {
    pattern: String,
    #[serde(default)]
    replace: String,
}
