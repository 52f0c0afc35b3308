//! Routes every quad to the document named by one of its terms.

use super::{FragmentationStrategy, QuadHandler, StreamAdapter};
use crate::blank::BlankNodeOwnershipResolver;
use crate::sink::QuadSink;
use crate::{component, ComponentRef, QuadComponent, QuadStream};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info};
use oxigraph::model::Quad;

/// Sends each quad to the IRI found at `key` (subject or object).
///
/// Literal keys are skipped. Blank node keys are resolved through the
/// resource that refers to them when `blank_nodes` is set, and skipped
/// otherwise.
#[derive(Debug, Clone)]
pub struct KeyFragmentationStrategy {
    key: QuadComponent,
    blank_nodes: bool,
}

impl KeyFragmentationStrategy {
    pub fn new(key: QuadComponent, blank_nodes: bool) -> Result<Self> {
        if !matches!(key, QuadComponent::Subject | QuadComponent::Object) {
            return Err(anyhow!("Cannot fragment by {}", key));
        }
        Ok(Self { key, blank_nodes })
    }

    pub fn subject() -> Self {
        Self {
            key: QuadComponent::Subject,
            blank_nodes: true,
        }
    }

    pub fn object() -> Self {
        Self {
            key: QuadComponent::Object,
            blank_nodes: true,
        }
    }
}

struct KeyHandler {
    key: QuadComponent,
    resolver: Option<BlankNodeOwnershipResolver>,
    routed: usize,
    skipped: usize,
}

#[async_trait]
impl QuadHandler for KeyHandler {
    async fn handle_quad(&mut self, quad: Quad, sink: &dyn QuadSink) -> Result<()> {
        match component(&quad, self.key) {
            ComponentRef::Named(target) => {
                if let Some(resolver) = self.resolver.as_mut() {
                    resolver.materialize_value_for_named_key(&quad, target);
                }
                sink.push(target, &quad).await?;
                self.routed += 1;
            }
            ComponentRef::Blank(_) => match self.resolver.as_mut() {
                Some(resolver) => {
                    resolver.push(&quad);
                }
                None => {
                    debug!("Skipping blank-keyed quad {}", quad);
                    self.skipped += 1;
                }
            },
            _ => self.skipped += 1,
        }
        Ok(())
    }

    async fn flush(&mut self, sink: &dyn QuadSink) -> Result<()> {
        let dropped = match self.resolver.as_mut() {
            Some(resolver) => resolver.flush(sink).await?,
            None => 0,
        };
        info!(
            "Fragmented by {}: {} quads routed directly, {} skipped, {} dropped",
            self.key, self.routed, self.skipped, dropped
        );
        Ok(())
    }
}

#[async_trait]
impl FragmentationStrategy for KeyFragmentationStrategy {
    async fn fragment(&self, stream: QuadStream<'_>, sink: &dyn QuadSink) -> Result<()> {
        let resolver = if self.blank_nodes {
            Some(BlankNodeOwnershipResolver::new(self.key)?)
        } else {
            None
        };
        let handler = KeyHandler {
            key: self.key,
            resolver,
            routed: 0,
            skipped: 0,
        };
        StreamAdapter::new(handler).run(stream, sink).await?;
        Ok(())
    }
}
