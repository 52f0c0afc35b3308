// Quad matchers decide which quads an exception strategy or a filtered sink accepts.

use crate::consts::TYPE;
use crate::{component, QuadComponent};
use oxigraph::model::{Quad, Term};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub trait QuadMatcher: Send + Sync {
    fn matches(&self, quad: &Quad) -> bool;
}

/// Matches quads whose term at `component` has a value matching `pattern`.
#[derive(Debug, Clone)]
pub struct TermValueMatcher {
    component: QuadComponent,
    pattern: Regex,
}

impl TermValueMatcher {
    pub fn new(component: QuadComponent, pattern: Regex) -> Self {
        Self { component, pattern }
    }
}

impl QuadMatcher for TermValueMatcher {
    fn matches(&self, quad: &Quad) -> bool {
        component(quad, self.component)
            .value()
            .is_some_and(|value| self.pattern.is_match(value))
    }
}

/// Matches `rdf:type` quads whose class matches `pattern`.
#[derive(Debug, Clone)]
pub struct TypeMatcher {
    pattern: Regex,
}

impl TypeMatcher {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl QuadMatcher for TypeMatcher {
    fn matches(&self, quad: &Quad) -> bool {
        if quad.predicate.as_ref() != TYPE {
            return false;
        }
        match &quad.object {
            Term::NamedNode(class) => self.pattern.is_match(class.as_str()),
            _ => false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherConfig {
    TermValue {
        component: QuadComponent,
        #[serde(with = "serde_regex")]
        pattern: Regex,
    },
    Type {
        #[serde(with = "serde_regex")]
        pattern: Regex,
    },
}

impl MatcherConfig {
    pub fn build(&self) -> Box<dyn QuadMatcher> {
        match self {
            MatcherConfig::TermValue { component, pattern } => {
                Box::new(TermValueMatcher::new(*component, pattern.clone()))
            }
            MatcherConfig::Type { pattern } => Box::new(TypeMatcher::new(pattern.clone())),
        }
    }
}
