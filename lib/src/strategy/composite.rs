use super::{fail_forks, fork_streams, send_to_fork, FragmentationStrategy};
use crate::sink::QuadSink;
use crate::QuadStream;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::{join, join_all};
use futures::StreamExt;
use log::{debug, error};

/// Runs every child strategy over its own copy of the input.
///
/// The input is forked once per child; children run concurrently and the
/// run completes only after all of them have settled. The first failure is
/// returned, the rest are logged.
pub struct CompositeFragmentationStrategy {
    strategies: Vec<Box<dyn FragmentationStrategy>>,
}

impl CompositeFragmentationStrategy {
    pub fn new(strategies: Vec<Box<dyn FragmentationStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[async_trait]
impl FragmentationStrategy for CompositeFragmentationStrategy {
    async fn fragment(&self, mut stream: QuadStream<'_>, sink: &dyn QuadSink) -> Result<()> {
        let (mut senders, forks) = fork_streams(self.strategies.len());

        let dispatcher = async move {
            let mut dispatched = 0usize;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(quad) => {
                        for fork in senders.iter_mut() {
                            send_to_fork(fork, quad.clone()).await;
                        }
                        dispatched += 1;
                    }
                    Err(e) => {
                        fail_forks(&mut senders, &e).await;
                        break;
                    }
                }
            }
            debug!(
                "Dispatched {} quads to {} strategies",
                dispatched,
                senders.len()
            );
            // dropping the senders ends every fork
        };

        let children = join_all(
            self.strategies
                .iter()
                .zip(forks)
                .map(|(strategy, fork)| strategy.fragment(fork, sink)),
        );

        let ((), results) = join(dispatcher, children).await;

        let mut first = None;
        for (i, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                error!("Strategy {} of composite failed: {:#}", i, e);
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
