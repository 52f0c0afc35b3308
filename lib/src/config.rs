//! Configuration of a fragmentation run: where quads come from, how they are
//! rewritten, how they are routed and where routed quads are written.
//!
//! A configuration is a JSON document; [`Config::from_file`] reads one and
//! [`Config::builder`] assembles one in code.

use crate::consts::{DEFAULT_CONTENT_TYPE, DEFAULT_STREAMS};
use crate::matcher::MatcherConfig;
use crate::routing::RouteRule;
use anyhow::{Context, Result};
use derive_builder::Builder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

fn default_streams() -> usize {
    DEFAULT_STREAMS
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_separator() -> String {
    "/".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OutputConfig {
    /// Maximum number of output files open at once.
    #[serde(default = "default_streams")]
    pub streams: usize,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub file_extension: Option<String>,
    /// Target to path rules, tried in order.
    #[serde(default)]
    pub routes: Vec<RouteRule>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            streams: DEFAULT_STREAMS,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            file_extension: None,
            routes: vec![],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    Subject {
        #[serde(default = "default_true")]
        blank_nodes: bool,
    },
    Object {
        #[serde(default = "default_true")]
        blank_nodes: bool,
    },
    ResourceObject {
        #[serde(with = "serde_regex")]
        type_pattern: Regex,
        #[serde(with = "serde_regex")]
        target_predicate: Regex,
    },
    Composite {
        strategies: Vec<StrategyConfig>,
    },
    Exception {
        base: Box<StrategyConfig>,
        #[serde(default)]
        exceptions: Vec<ExceptionConfig>,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Subject { blank_nodes: true }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExceptionConfig {
    pub matcher: MatcherConfig,
    pub strategy: StrategyConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformerConfig {
    ReplaceIri {
        #[serde(with = "serde_regex")]
        pattern: Regex,
        replacement: String,
    },
    RemapResourceIdentifier {
        #[serde(with = "serde_regex")]
        type_pattern: Regex,
        #[serde(with = "serde_regex")]
        identifier_predicate: Regex,
        #[serde(with = "serde_regex")]
        target_predicate: Regex,
        #[serde(default = "default_separator")]
        separator: String,
    },
    DistributeResources {
        #[serde(with = "serde_regex")]
        type_pattern: Regex,
        #[serde(with = "serde_regex")]
        target_predicate: Regex,
        delegates: Vec<TransformerConfig>,
    },
    AppendTypeIndex {
        #[serde(with = "serde_regex")]
        type_pattern: Regex,
        #[serde(with = "serde_regex")]
        target_predicate: Regex,
        #[serde(default)]
        index_fragment: Option<String>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct Config {
    /// Files to read quads from, in order.
    #[builder(default)]
    #[serde(default)]
    pub input: Vec<PathBuf>,
    #[builder(default)]
    #[serde(default)]
    pub output: OutputConfig,
    #[builder(default)]
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[builder(default)]
    #[serde(default)]
    pub transformers: Vec<TransformerConfig>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn from_file(file: &Path) -> Result<Self> {
        let reader = std::fs::File::open(file)
            .map(BufReader::new)
            .with_context(|| format!("Failed to open config file {}", file.display()))?;
        let config: Config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file {}", file.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, file: &Path) -> Result<()> {
        let config_str = serde_json::to_string_pretty(&self)?;
        let mut file = std::fs::File::create(file)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    /// Prints the configuration for command line output.
    pub fn print(&self) {
        println!("Configuration:");
        if !self.input.is_empty() {
            println!("  Input:");
            for path in &self.input {
                println!("    - {}", path.display());
            }
        }
        println!("  Output:");
        println!("    Streams: {}", self.output.streams);
        println!("    Content Type: {}", self.output.content_type);
        if let Some(ext) = &self.output.file_extension {
            println!("    File Extension: {}", ext);
        }
        println!("    Routes:");
        for rule in &self.output.routes {
            println!("      - {} -> {}", rule.pattern, rule.replacement);
        }
        println!("  Strategy: {}", strategy_name(&self.strategy));
        if !self.transformers.is_empty() {
            println!("  Transformers:");
            for transformer in &self.transformers {
                println!("    - {}", transformer_name(transformer));
            }
        }
    }
}

fn strategy_name(strategy: &StrategyConfig) -> String {
    match strategy {
        StrategyConfig::Subject { .. } => "subject".to_string(),
        StrategyConfig::Object { .. } => "object".to_string(),
        StrategyConfig::ResourceObject { type_pattern, .. } => {
            format!("resource_object ({})", type_pattern)
        }
        StrategyConfig::Composite { strategies } => format!(
            "composite [{}]",
            strategies
                .iter()
                .map(strategy_name)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        StrategyConfig::Exception { base, exceptions } => format!(
            "exception (base {}, {} exceptions)",
            strategy_name(base),
            exceptions.len()
        ),
    }
}

fn transformer_name(transformer: &TransformerConfig) -> &'static str {
    match transformer {
        TransformerConfig::ReplaceIri { .. } => "replace_iri",
        TransformerConfig::RemapResourceIdentifier { .. } => "remap_resource_identifier",
        TransformerConfig::DistributeResources { .. } => "distribute_resources",
        TransformerConfig::AppendTypeIndex { .. } => "append_type_index",
    }
}
