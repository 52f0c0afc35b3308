//! Places typed resources in the document named by one of their own values.
//!
//! A resource whose `rdf:type` matches `type_pattern` is buffered until its
//! `target_predicate` value is known; all of its quads, earlier and later,
//! then go to that target. Everything else is routed by subject, with blank
//! node subjects following whichever resource refers to them.

use super::{FragmentationStrategy, QuadHandler, StreamAdapter};
use crate::blank::BlankNodeOwnershipResolver;
use crate::resource::ResourceIdentifier;
use crate::sink::QuadSink;
use crate::{QuadComponent, QuadStream};
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use oxigraph::model::{NamedNode, NamedOrBlankNode, Quad};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct ResourceObjectFragmentationStrategy {
    type_pattern: Regex,
    target_predicate: Regex,
}

impl ResourceObjectFragmentationStrategy {
    pub fn new(type_pattern: Regex, target_predicate: Regex) -> Self {
        Self {
            type_pattern,
            target_predicate,
        }
    }
}

struct ResourceObjectHandler {
    resources: ResourceIdentifier<NamedNode>,
    resolver: BlankNodeOwnershipResolver,
}

impl ResourceObjectHandler {
    async fn route(&mut self, target: &str, quad: &Quad, sink: &dyn QuadSink) -> Result<()> {
        self.resolver.materialize_value_for_named_key(quad, target);
        sink.push(target, quad).await
    }
}

#[async_trait]
impl QuadHandler for ResourceObjectHandler {
    async fn handle_quad(&mut self, quad: Quad, sink: &dyn QuadSink) -> Result<()> {
        if self.resources.try_initializing_buffer(&quad) {
            return Ok(());
        }

        if self
            .resources
            .is_quad_buffered(&quad, Some(QuadComponent::Subject))
        {
            self.resources.try_storing_target(&quad)?;
            if !self.resources.is_complete(&quad) {
                return Ok(());
            }
            let target = self
                .resources
                .get_buffer_resource(&quad)
                .and_then(|resource| resource.target.clone())
                .ok_or_else(|| anyhow::anyhow!("Completed resource has no target"))?;
            if let Some(resource) = self.resources.apply_mapping(&quad.subject, target.clone()) {
                debug!(
                    "Resource {} resolved to {}, replaying {} quads",
                    resource.subject,
                    target,
                    resource.quads.len()
                );
                for buffered in &resource.quads {
                    self.route(target.as_str(), buffered, sink).await?;
                }
            }
            return Ok(());
        }

        if let Some(target) = self.resources.get_mapping(&quad.subject).cloned() {
            return self.route(target.as_str(), &quad, sink).await;
        }

        match &quad.subject {
            NamedOrBlankNode::NamedNode(subject) => {
                let target = subject.as_str().to_string();
                self.route(&target, &quad, sink).await
            }
            NamedOrBlankNode::BlankNode(_) => {
                self.resolver.push(&quad);
                Ok(())
            }
        }
    }

    async fn flush(&mut self, sink: &dyn QuadSink) -> Result<()> {
        self.resolver.flush(sink).await?;
        self.resources.on_end()
    }
}

#[async_trait]
impl FragmentationStrategy for ResourceObjectFragmentationStrategy {
    async fn fragment(&self, stream: QuadStream<'_>, sink: &dyn QuadSink) -> Result<()> {
        let handler = ResourceObjectHandler {
            resources: ResourceIdentifier::new(
                self.type_pattern.clone(),
                self.target_predicate.clone(),
            ),
            resolver: BlankNodeOwnershipResolver::new(QuadComponent::Subject)?,
        };
        StreamAdapter::new(handler).run(stream, sink).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::TYPE;
    use crate::errors::FragmentError;
    use crate::quad_stream;
    use crate::sink::MemoryQuadSink;
    use oxigraph::model::{BlankNode, GraphName, Literal, Term};

    fn named(iri: &str) -> NamedNode {
        NamedNode::new_unchecked(iri)
    }

    fn q(s: impl Into<NamedOrBlankNode>, p: NamedNode, o: impl Into<Term>) -> Quad {
        Quad::new(s, p, o, GraphName::DefaultGraph)
    }

    fn strategy() -> ResourceObjectFragmentationStrategy {
        ResourceObjectFragmentationStrategy::new(
            Regex::new("vocab#Post$").unwrap(),
            Regex::new("vocab#hasCreator$").unwrap(),
        )
    }

    #[tokio::test]
    async fn buffered_resource_goes_to_its_creator() {
        let post = named("ex:post1");
        let quads = vec![
            q(post.clone(), named("ex:content"), Literal::new_simple_literal("hi")),
            q(post.clone(), TYPE.into_owned(), named("ex:vocab#Post")),
            q(post.clone(), named("ex:tag"), BlankNode::new_unchecked("t")),
            q(post.clone(), named("ex:vocab#hasCreator"), named("ex:alice")),
            q(post.clone(), named("ex:date"), Literal::new_simple_literal("today")),
            q(BlankNode::new_unchecked("t"), named("ex:label"), Literal::new_simple_literal("x")),
            q(named("ex:bob"), named("ex:knows"), named("ex:alice")),
        ];
        let sink = MemoryQuadSink::new();
        strategy().fragment(quad_stream(quads), &sink).await.unwrap();

        // the content quad arrived before the type and is routed by subject
        assert_eq!(sink.quads_for("ex:post1").len(), 1);
        // type, tag, creator, date, and the tag's blank node
        assert_eq!(sink.quads_for("ex:alice").len(), 5);
        assert_eq!(sink.quads_for("ex:bob").len(), 1);
    }

    #[tokio::test]
    async fn resource_without_target_fails_at_end() {
        let quads = vec![q(named("ex:post1"), TYPE.into_owned(), named("ex:vocab#Post"))];
        let sink = MemoryQuadSink::new();
        let err = strategy()
            .fragment(quad_stream(quads), &sink)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FragmentError>(),
            Some(FragmentError::UnresolvedBuffer { .. })
        ));
        assert!(sink.pushed().is_empty());
    }

    #[tokio::test]
    async fn later_creator_quads_follow_the_mapping() {
        let post = named("ex:post1");
        let quads = vec![
            q(post.clone(), TYPE.into_owned(), named("ex:vocab#Post")),
            q(post.clone(), named("ex:vocab#hasCreator"), named("ex:alice")),
            q(post.clone(), named("ex:vocab#hasCreator"), named("ex:bob")),
        ];
        let sink = MemoryQuadSink::new();
        // the resource completed on the first creator, so the second quad is
        // just routed to the mapped target
        strategy().fragment(quad_stream(quads), &sink).await.unwrap();
        assert_eq!(sink.quads_for("ex:alice").len(), 3);
    }
}
