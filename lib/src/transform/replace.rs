use super::QuadTransformer;
use anyhow::{Context, Result};
use oxigraph::model::{GraphName, NamedNode, NamedOrBlankNode, Quad, Term};
use regex::Regex;
use std::borrow::Cow;

/// Rewrites every IRI matching `pattern` in all four positions of a quad.
#[derive(Debug, Clone)]
pub struct ReplaceIri {
    pattern: Regex,
    replacement: String,
}

impl ReplaceIri {
    pub fn new(pattern: Regex, replacement: impl Into<String>) -> Self {
        Self {
            pattern,
            replacement: replacement.into(),
        }
    }

    fn replace(&self, node: NamedNode) -> Result<NamedNode> {
        let rewritten = match self.pattern.replace(node.as_str(), self.replacement.as_str()) {
            Cow::Borrowed(_) => None,
            Cow::Owned(iri) => Some(iri),
        };
        match rewritten {
            None => Ok(node),
            Some(iri) => NamedNode::new(iri.as_str())
                .with_context(|| format!("Rewriting {} produced an invalid IRI {}", node, iri)),
        }
    }
}

impl QuadTransformer for ReplaceIri {
    fn transform(&mut self, quad: Quad) -> Result<Vec<Quad>> {
        let subject = match quad.subject {
            NamedOrBlankNode::NamedNode(n) => self.replace(n)?.into(),
            other => other,
        };
        let predicate = self.replace(quad.predicate)?;
        let object = match quad.object {
            Term::NamedNode(n) => self.replace(n)?.into(),
            other => other,
        };
        let graph_name = match quad.graph_name {
            GraphName::NamedNode(n) => self.replace(n)?.into(),
            other => other,
        };
        Ok(vec![Quad::new(subject, predicate, object, graph_name)])
    }
}
