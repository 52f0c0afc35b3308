//! Fragmentation strategies decide the target document of every quad.
//!
//! Simple strategies implement [`QuadHandler`] and are driven by a
//! [`StreamAdapter`], which pulls one quad at a time and waits for the handler
//! before pulling the next. The composite and exception strategies instead
//! fork the input into one stream per child strategy and run the children
//! concurrently.

pub mod composite;
pub mod exception;
pub mod key;
pub mod resource_object;

pub use composite::CompositeFragmentationStrategy;
pub use exception::ExceptionFragmentationStrategy;
pub use key::KeyFragmentationStrategy;
pub use resource_object::ResourceObjectFragmentationStrategy;

use crate::config::StrategyConfig;
use crate::errors::FragmentError;
use crate::sink::QuadSink;
use crate::{QuadComponent, QuadStream};
use anyhow::Result;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use log::debug;
use oxigraph::model::Quad;

/// Number of quads buffered per forked stream before the dispatcher waits.
const FORK_BUFFER: usize = 64;

#[async_trait]
pub trait FragmentationStrategy: Send + Sync {
    /// Consumes `stream` and pushes every routed quad to `sink`.
    async fn fragment(&self, stream: QuadStream<'_>, sink: &dyn QuadSink) -> Result<()>;
}

#[async_trait]
pub trait QuadHandler: Send {
    async fn handle_quad(&mut self, quad: Quad, sink: &dyn QuadSink) -> Result<()>;

    /// Called once after the last quad.
    async fn flush(&mut self, _sink: &dyn QuadSink) -> Result<()> {
        Ok(())
    }
}

/// Drives a quad stream through a [`QuadHandler`], one quad at a time.
pub struct StreamAdapter<H> {
    handler: H,
}

impl<H: QuadHandler> StreamAdapter<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Runs the handler over every quad, then flushes it. An error item aborts
    /// the run without flushing; see [`FragmentError::from_stream_item`].
    pub async fn run(mut self, mut stream: QuadStream<'_>, sink: &dyn QuadSink) -> Result<H> {
        let mut handled = 0usize;
        while let Some(item) = stream.next().await {
            let quad = item.map_err(FragmentError::from_stream_item)?;
            self.handler.handle_quad(quad, sink).await?;
            handled += 1;
        }
        debug!("Stream ended after {} quads, flushing", handled);
        self.handler.flush(sink).await?;
        Ok(self.handler)
    }
}

pub(crate) type ForkSender = mpsc::Sender<Result<Quad>>;

/// Creates `n` forked streams and the senders that feed them.
pub(crate) fn fork_streams(n: usize) -> (Vec<ForkSender>, Vec<QuadStream<'static>>) {
    (0..n)
        .map(|_| {
            let (tx, rx) = mpsc::channel(FORK_BUFFER);
            (tx, Box::pin(rx) as QuadStream<'static>)
        })
        .unzip()
}

/// Sends `quad` to one fork. A fork whose strategy already stopped has
/// dropped its receiver; quads for it are discarded.
pub(crate) async fn send_to_fork(fork: &mut ForkSender, quad: Quad) {
    if fork.send(Ok(quad)).await.is_err() {
        debug!("Forked stream is no longer consumed");
    }
}

/// Forwards a stream error to every fork, keeping its kind.
pub(crate) async fn fail_forks(forks: &mut [ForkSender], error: &anyhow::Error) {
    let error = FragmentError::for_fork(error);
    for fork in forks.iter_mut() {
        let _ = fork.send(Err(error.clone().into())).await;
    }
}

/// Builds the strategy tree described by `config`.
pub fn strategy_from_config(config: &StrategyConfig) -> Result<Box<dyn FragmentationStrategy>> {
    Ok(match config {
        StrategyConfig::Subject { blank_nodes } => Box::new(KeyFragmentationStrategy::new(
            QuadComponent::Subject,
            *blank_nodes,
        )?),
        StrategyConfig::Object { blank_nodes } => Box::new(KeyFragmentationStrategy::new(
            QuadComponent::Object,
            *blank_nodes,
        )?),
        StrategyConfig::ResourceObject {
            type_pattern,
            target_predicate,
        } => Box::new(ResourceObjectFragmentationStrategy::new(
            type_pattern.clone(),
            target_predicate.clone(),
        )),
        StrategyConfig::Composite { strategies } => {
            let strategies = strategies
                .iter()
                .map(strategy_from_config)
                .collect::<Result<Vec<_>>>()?;
            Box::new(CompositeFragmentationStrategy::new(strategies))
        }
        StrategyConfig::Exception { base, exceptions } => {
            let base = strategy_from_config(base)?;
            let exceptions = exceptions
                .iter()
                .map(|e| Ok((e.matcher.build(), strategy_from_config(&e.strategy)?)))
                .collect::<Result<Vec<_>>>()?;
            Box::new(ExceptionFragmentationStrategy::new(base, exceptions))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryQuadSink;
    use oxigraph::model::{GraphName, NamedNode};

    struct Recorder {
        seen: Vec<String>,
        flushed: bool,
    }

    #[async_trait]
    impl QuadHandler for Recorder {
        async fn handle_quad(&mut self, quad: Quad, sink: &dyn QuadSink) -> Result<()> {
            self.seen.push(quad.subject.to_string());
            sink.push("ex:t", &quad).await
        }

        async fn flush(&mut self, _sink: &dyn QuadSink) -> Result<()> {
            self.flushed = true;
            Ok(())
        }
    }

    fn quad(s: &str) -> Quad {
        Quad::new(
            NamedNode::new_unchecked(s),
            NamedNode::new_unchecked("ex:p"),
            NamedNode::new_unchecked("ex:o"),
            GraphName::DefaultGraph,
        )
    }

    #[tokio::test]
    async fn adapter_handles_in_order_then_flushes() {
        let sink = MemoryQuadSink::new();
        let recorder = StreamAdapter::new(Recorder {
            seen: vec![],
            flushed: false,
        })
        .run(crate::quad_stream(vec![quad("ex:a"), quad("ex:b")]), &sink)
        .await
        .unwrap();
        assert_eq!(recorder.seen, vec!["<ex:a>", "<ex:b>"]);
        assert!(recorder.flushed);
        assert_eq!(sink.pushed().len(), 2);
    }

    #[tokio::test]
    async fn adapter_stops_on_upstream_error() {
        let sink = MemoryQuadSink::new();
        let items: Vec<Result<Quad>> = vec![
            Ok(quad("ex:a")),
            Err(anyhow::anyhow!("disk on fire")),
            Ok(quad("ex:b")),
        ];
        let err = StreamAdapter::new(Recorder {
            seen: vec![],
            flushed: false,
        })
        .run(Box::pin(futures::stream::iter(items)), &sink)
        .await
        .err()
        .unwrap();
        assert_eq!(
            err.downcast_ref::<FragmentError>(),
            Some(&FragmentError::Upstream {
                message: "disk on fire".to_string()
            })
        );
        assert_eq!(sink.pushed().len(), 1);
    }
}
