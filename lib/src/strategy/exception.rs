use super::{fail_forks, fork_streams, send_to_fork, FragmentationStrategy};
use crate::matcher::QuadMatcher;
use crate::sink::QuadSink;
use crate::QuadStream;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::{join, join_all};
use futures::StreamExt;
use log::{debug, error};

/// Sends each quad to the first exception whose matcher accepts it, or to the
/// base strategy when none does.
pub struct ExceptionFragmentationStrategy {
    base: Box<dyn FragmentationStrategy>,
    exceptions: Vec<(Box<dyn QuadMatcher>, Box<dyn FragmentationStrategy>)>,
}

impl ExceptionFragmentationStrategy {
    pub fn new(
        base: Box<dyn FragmentationStrategy>,
        exceptions: Vec<(Box<dyn QuadMatcher>, Box<dyn FragmentationStrategy>)>,
    ) -> Self {
        Self { base, exceptions }
    }

    /// Fork index for `quad`: 0 is the base, `i + 1` the i-th exception.
    fn fork_for(&self, quad: &oxigraph::model::Quad) -> usize {
        self.exceptions
            .iter()
            .position(|(matcher, _)| matcher.matches(quad))
            .map_or(0, |i| i + 1)
    }
}

#[async_trait]
impl FragmentationStrategy for ExceptionFragmentationStrategy {
    async fn fragment(&self, mut stream: QuadStream<'_>, sink: &dyn QuadSink) -> Result<()> {
        let (mut senders, mut forks) = fork_streams(self.exceptions.len() + 1);
        let exception_forks = forks.split_off(1);
        let base_fork = forks.remove(0);

        let dispatcher = async move {
            let mut counts = vec![0usize; senders.len()];
            while let Some(item) = stream.next().await {
                match item {
                    Ok(quad) => {
                        let i = self.fork_for(&quad);
                        counts[i] += 1;
                        send_to_fork(&mut senders[i], quad).await;
                    }
                    Err(e) => {
                        fail_forks(&mut senders, &e).await;
                        break;
                    }
                }
            }
            debug!("Exception dispatch finished, quads per fork: {:?}", counts);
            drop(senders);
        };

        let base = self.base.fragment(base_fork, sink);
        let exceptions = join_all(
            self.exceptions
                .iter()
                .zip(exception_forks)
                .map(|((_, strategy), fork)| strategy.fragment(fork, sink)),
        );

        let ((), (base_result, exception_results)) =
            join(dispatcher, join(base, exceptions)).await;

        if let Err(e) = &base_result {
            error!("Base strategy failed: {:#}", e);
        }
        let mut first = base_result.err();
        for (i, result) in exception_results.into_iter().enumerate() {
            if let Err(e) = result {
                error!("Exception strategy {} failed: {:#}", i, e);
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
