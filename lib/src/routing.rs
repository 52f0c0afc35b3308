//! Maps target IRIs to output file paths using an ordered list of regex rules.

use crate::errors::FragmentError;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One `pattern -> replacement` rule. The replacement may refer to capture
/// groups (`$1`, `${name}`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RouteRule {
    #[serde(with = "serde_regex")]
    pub pattern: Regex,
    pub replacement: String,
}

impl RouteRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PathRouter {
    rules: Vec<RouteRule>,
    file_extension: Option<String>,
}

impl PathRouter {
    pub fn new(rules: Vec<RouteRule>, file_extension: Option<String>) -> Self {
        Self {
            rules,
            file_extension,
        }
    }

    /// Resolves the file that holds the document identified by `target`.
    /// The fragment of the target is ignored; the first matching rule wins.
    pub fn target_to_path(&self, target: &str) -> Result<PathBuf> {
        let document = match target.split_once('#') {
            Some((document, _)) => document,
            None => target,
        };
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.pattern.is_match(document))
            .ok_or_else(|| FragmentError::Configuration {
                target: target.to_string(),
            })?;
        let mut path = rule
            .pattern
            .replace(document, rule.replacement.as_str())
            .into_owned();
        if let Some(ext) = &self.file_extension {
            path.push_str(ext);
        }
        Ok(PathBuf::from(path))
    }
}
