//! Streaming fragmentation of RDF datasets.
//!
//! Quads are pulled from an input stream, optionally rewritten by a chain of
//! [`transform::QuadTransformer`]s, and routed by a
//! [`strategy::FragmentationStrategy`] to target documents. Routed quads leave
//! through a [`sink::QuadSink`], typically a [`sink::FileQuadSink`] backed by a
//! [`writer::ParallelFileWriter`] that keeps a bounded number of files open.
//!
//! Nothing is materialized up front: resources whose identity depends on quads
//! that have not arrived yet are buffered by [`resource::ResourceIdentifier`],
//! and quads keyed by blank nodes wait in [`blank::BlankNodeOwnershipResolver`]
//! until a named owner shows up.

extern crate derive_builder;

pub mod blank;
pub mod config;
pub mod consts;
pub mod errors;
pub mod fragmenter;
pub mod input;
pub mod matcher;
pub mod pool;
pub mod resource;
pub mod routing;
pub mod sink;
pub mod strategy;
pub mod transform;
pub mod writer;

use futures::stream::BoxStream;
use oxigraph::model::{GraphName, NamedOrBlankNode, Quad, Term};
use serde::{Deserialize, Serialize};

pub use fragmenter::Fragmenter;

/// A single-pass stream of quads. An `Err` item signals that the upstream source failed.
pub type QuadStream<'a> = BoxStream<'a, anyhow::Result<Quad>>;

/// Wraps an in-memory list of quads as a [`QuadStream`].
pub fn quad_stream<'a>(quads: Vec<Quad>) -> QuadStream<'a> {
    Box::pin(futures::stream::iter(quads.into_iter().map(Ok)))
}

/// The position of a term inside a quad.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QuadComponent {
    Subject,
    Predicate,
    Object,
    Graph,
}

impl std::fmt::Display for QuadComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuadComponent::Subject => write!(f, "subject"),
            QuadComponent::Predicate => write!(f, "predicate"),
            QuadComponent::Object => write!(f, "object"),
            QuadComponent::Graph => write!(f, "graph"),
        }
    }
}

/// Borrowed view of one quad position, so routing code can treat the
/// subject, object and graph slots the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRef<'a> {
    Named(&'a str),
    Blank(&'a str),
    Literal(&'a str),
    DefaultGraph,
    Other,
}

impl<'a> ComponentRef<'a> {
    /// The string value of the term, if it has one.
    pub fn value(&self) -> Option<&'a str> {
        match self {
            ComponentRef::Named(v) | ComponentRef::Blank(v) | ComponentRef::Literal(v) => Some(v),
            ComponentRef::DefaultGraph | ComponentRef::Other => None,
        }
    }
}

/// Returns the term found at `component` of `quad`.
pub fn component(quad: &Quad, component: QuadComponent) -> ComponentRef<'_> {
    match component {
        QuadComponent::Subject => match &quad.subject {
            NamedOrBlankNode::NamedNode(n) => ComponentRef::Named(n.as_str()),
            NamedOrBlankNode::BlankNode(b) => ComponentRef::Blank(b.as_str()),
        },
        QuadComponent::Predicate => ComponentRef::Named(quad.predicate.as_str()),
        QuadComponent::Object => term_ref(&quad.object),
        QuadComponent::Graph => match &quad.graph_name {
            GraphName::NamedNode(n) => ComponentRef::Named(n.as_str()),
            GraphName::BlankNode(b) => ComponentRef::Blank(b.as_str()),
            GraphName::DefaultGraph => ComponentRef::DefaultGraph,
        },
    }
}

pub(crate) fn term_ref(term: &Term) -> ComponentRef<'_> {
    match term {
        Term::NamedNode(n) => ComponentRef::Named(n.as_str()),
        Term::BlankNode(b) => ComponentRef::Blank(b.as_str()),
        Term::Literal(l) => ComponentRef::Literal(l.value()),
        // quoted triples never act as keys or owners
        #[allow(unreachable_patterns)]
        _ => ComponentRef::Other,
    }
}
