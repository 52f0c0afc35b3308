//! Ties one run together: transformers, then a strategy, then a sink.

use crate::config::Config;
use crate::input::read_quads;
use crate::routing::PathRouter;
use crate::sink::{FileQuadSink, QuadSink};
use crate::strategy::{strategy_from_config, FragmentationStrategy};
use crate::transform::{transform_stream, transformer_from_config, QuadTransformer};
use crate::QuadStream;
use anyhow::Result;
use chrono::Utc;
use log::{error, info};

pub struct Fragmenter {
    strategy: Box<dyn FragmentationStrategy>,
    sink: Box<dyn QuadSink>,
    transformers: Vec<Box<dyn QuadTransformer>>,
}

impl Fragmenter {
    pub fn new(strategy: Box<dyn FragmentationStrategy>, sink: Box<dyn QuadSink>) -> Self {
        Self {
            strategy,
            sink,
            transformers: vec![],
        }
    }

    pub fn with_transformers(mut self, transformers: Vec<Box<dyn QuadTransformer>>) -> Self {
        self.transformers = transformers;
        self
    }

    /// Builds the strategy, the transformers and a file sink from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let strategy = strategy_from_config(&config.strategy)?;
        let transformers = config
            .transformers
            .iter()
            .map(transformer_from_config)
            .collect::<Result<Vec<_>>>()?;
        let router = PathRouter::new(
            config.output.routes.clone(),
            config.output.file_extension.clone(),
        );
        let sink = FileQuadSink::new(
            router,
            config.output.content_type.clone(),
            config.output.streams,
        );
        Ok(Self::new(strategy, Box::new(sink)).with_transformers(transformers))
    }

    /// Reads the configured input files and fragments them.
    pub async fn run_config(config: &Config) -> Result<()> {
        let fragmenter = Self::from_config(config)?;
        fragmenter.run(read_quads(config.input.clone())).await
    }

    /// Fragments `stream` into the sink, then closes the sink. The sink is
    /// closed even when fragmentation fails; the first error is returned.
    pub async fn run(self, stream: QuadStream<'_>) -> Result<()> {
        let start = Utc::now();
        info!(
            "Starting fragmentation with {} transformers",
            self.transformers.len()
        );
        let stream = transform_stream(stream, self.transformers);
        let fragmented = self.strategy.fragment(stream, self.sink.as_ref()).await;
        if let Err(e) = &fragmented {
            error!("Fragmentation failed: {:#}", e);
        }
        let closed = self.sink.close().await;
        fragmented?;
        closed?;
        info!(
            "Fragmentation finished in {} ms",
            (Utc::now() - start).num_milliseconds()
        );
        Ok(())
    }
}
