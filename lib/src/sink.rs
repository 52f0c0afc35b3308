//! Sinks accept `(target, quad)` pairs; they are the only way routed quads
//! leave a fragmentation run.

use crate::matcher::QuadMatcher;
use crate::routing::PathRouter;
use crate::writer::ParallelFileWriter;
use anyhow::Result;
use async_trait::async_trait;
use log::info;
use oxigraph::model::Quad;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[async_trait]
pub trait QuadSink: Send + Sync {
    /// Persists `quad` in the document identified by `target`.
    async fn push(&self, target: &str, quad: &Quad) -> Result<()>;

    /// Flushes everything pushed so far. Called once, at the end of a run.
    async fn close(&self) -> Result<()>;
}

/// Writes every quad to the file its target routes to.
pub struct FileQuadSink {
    router: PathRouter,
    content_type: String,
    writer: ParallelFileWriter,
    written: AtomicUsize,
}

impl FileQuadSink {
    pub fn new(router: PathRouter, content_type: impl Into<String>, streams: usize) -> Self {
        Self {
            router,
            content_type: content_type.into(),
            writer: ParallelFileWriter::new(streams),
            written: AtomicUsize::new(0),
        }
    }

    pub fn writer(&self) -> &ParallelFileWriter {
        &self.writer
    }

    /// Number of quads written so far.
    pub fn num_quads(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuadSink for FileQuadSink {
    async fn push(&self, target: &str, quad: &Quad) -> Result<()> {
        let path = self.router.target_to_path(target)?;
        self.writer.write(&path, &self.content_type, quad).await?;
        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        info!(
            "Closing file sink: {} quads, {} files opened",
            self.num_quads(),
            self.writer.total_opened()
        );
        self.writer.close().await
    }
}

/// Forwards every quad to each inner sink, in order.
pub struct CompositeQuadSink {
    sinks: Vec<Box<dyn QuadSink>>,
}

impl CompositeQuadSink {
    pub fn new(sinks: Vec<Box<dyn QuadSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl QuadSink for CompositeQuadSink {
    async fn push(&self, target: &str, quad: &Quad) -> Result<()> {
        for sink in &self.sinks {
            sink.push(target, quad).await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for sink in &self.sinks {
            sink.close().await?;
        }
        Ok(())
    }
}

/// Forwards only the quads accepted by a matcher.
pub struct FilteredQuadSink {
    matcher: Box<dyn QuadMatcher>,
    sink: Box<dyn QuadSink>,
}

impl FilteredQuadSink {
    pub fn new(matcher: Box<dyn QuadMatcher>, sink: Box<dyn QuadSink>) -> Self {
        Self { matcher, sink }
    }
}

#[async_trait]
impl QuadSink for FilteredQuadSink {
    async fn push(&self, target: &str, quad: &Quad) -> Result<()> {
        if self.matcher.matches(quad) {
            self.sink.push(target, quad).await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.sink.close().await
    }
}

/// Keeps every pushed pair in memory.
#[derive(Default)]
pub struct MemoryQuadSink {
    pushed: Mutex<Vec<(String, Quad)>>,
    closed: AtomicUsize,
}

impl MemoryQuadSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pairs pushed so far, in push order.
    pub fn pushed(&self) -> Vec<(String, Quad)> {
        self.pushed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The quads pushed to one target, in push order.
    pub fn quads_for(&self, target: &str) -> Vec<Quad> {
        self.pushed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(t, _)| t == target)
            .map(|(_, q)| q.clone())
            .collect()
    }

    /// How many times `close` was called.
    pub fn times_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuadSink for MemoryQuadSink {
    async fn push(&self, target: &str, quad: &Quad) -> Result<()> {
        self.pushed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target.to_string(), quad.clone()));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl<S: QuadSink + ?Sized> QuadSink for std::sync::Arc<S> {
    async fn push(&self, target: &str, quad: &Quad) -> Result<()> {
        (**self).push(target, quad).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::TermValueMatcher;
    use crate::routing::RouteRule;
    use crate::QuadComponent;
    use oxigraph::model::{GraphName, NamedNode};
    use regex::Regex;
    use std::sync::Arc;

    fn quad(s: &str, p: &str, o: &str) -> Quad {
        Quad::new(
            NamedNode::new_unchecked(s),
            NamedNode::new_unchecked(p),
            NamedNode::new_unchecked(o),
            GraphName::DefaultGraph,
        )
    }

    #[tokio::test]
    async fn composite_forwards_to_all() {
        let a = Arc::new(MemoryQuadSink::new());
        let b = Arc::new(MemoryQuadSink::new());
        let sink = CompositeQuadSink::new(vec![Box::new(a.clone()), Box::new(b.clone())]);
        let q = quad("ex:s", "ex:p", "ex:o");
        sink.push("ex:t", &q).await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(a.pushed(), vec![("ex:t".to_string(), q.clone())]);
        assert_eq!(b.pushed(), vec![("ex:t".to_string(), q)]);
        assert_eq!(a.times_closed(), 1);
        assert_eq!(b.times_closed(), 1);
    }

    #[tokio::test]
    async fn composite_reports_first_failure() {
        let file = FileQuadSink::new(
            PathRouter::new(vec![RouteRule::new("^ex:", "unused/").unwrap()], None),
            "application/n-quads",
            4,
        );
        let memory = Arc::new(MemoryQuadSink::new());
        let sink = CompositeQuadSink::new(vec![Box::new(file), Box::new(memory.clone())]);
        let err = sink
            .push("urn:unrouted", &quad("ex:s", "ex:p", "ex:o"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("urn:unrouted"));
        // the second sink is never reached
        assert!(memory.pushed().is_empty());
    }

    #[tokio::test]
    async fn filtered_sink_drops_rejected_quads() {
        let memory = Arc::new(MemoryQuadSink::new());
        let sink = FilteredQuadSink::new(
            Box::new(TermValueMatcher::new(
                QuadComponent::Predicate,
                Regex::new("keep$").unwrap(),
            )),
            Box::new(memory.clone()),
        );
        sink.push("ex:t", &quad("ex:s", "ex:keep", "ex:o"))
            .await
            .unwrap();
        sink.push("ex:t", &quad("ex:s", "ex:drop", "ex:o"))
            .await
            .unwrap();
        assert_eq!(memory.quads_for("ex:t").len(), 1);
    }

    #[tokio::test]
    async fn file_sink_writes_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = format!("{}/", dir.path().display());
        let sink = FileQuadSink::new(
            PathRouter::new(
                vec![RouteRule::new("^http://example.org/", prefix).unwrap()],
                Some(".nq".to_string()),
            ),
            "application/n-quads",
            1,
        );
        for (s, t) in [("a", "doc1"), ("b", "doc2"), ("c", "doc1")] {
            let q = quad(
                &format!("http://example.org/{}", s),
                "http://example.org/p",
                "http://example.org/o",
            );
            sink.push(&format!("http://example.org/{}#it", t), &q)
                .await
                .unwrap();
        }
        sink.close().await.unwrap();
        assert_eq!(sink.num_quads(), 3);
        // doc1, doc2, then doc1 again after its eviction
        assert_eq!(sink.writer().total_opened(), 3);
        let doc1 = std::fs::read_to_string(dir.path().join("doc1.nq")).unwrap();
        assert_eq!(doc1.lines().count(), 2);
        assert!(doc1.contains("<http://example.org/c>"));
        assert_eq!(sink.writer().peak_open_handles(), 1);
    }
}
