//! Quad transformers rewrite the input stream before it is fragmented.
//!
//! A transformer receives one quad at a time and returns zero or more quads.
//! Transformers that need to see a whole resource before rewriting it hold
//! its quads back and release them all at once, so the number of quads out
//! does not have to match the number in. When the input ends every
//! transformer's [`QuadTransformer::end`] is called; a transformer that still
//! holds quads fails there.

mod distribute;
mod remap;
mod replace;
mod type_index;

pub use distribute::DistributeResources;
pub use remap::RemapResourceIdentifier;
pub use replace::ReplaceIri;
pub use type_index::AppendTypeIndex;

use crate::config::TransformerConfig;
use crate::QuadStream;
use anyhow::Result;
use futures::StreamExt;
use log::{debug, error};
use oxigraph::model::Quad;
use std::collections::VecDeque;

pub trait QuadTransformer: Send {
    fn transform(&mut self, quad: Quad) -> Result<Vec<Quad>>;

    /// Called once after the last quad.
    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Passes `quad` through each transformer in order.
pub(crate) fn apply_chain(
    transformers: &mut [Box<dyn QuadTransformer>],
    quad: Quad,
) -> Result<Vec<Quad>> {
    let mut quads = vec![quad];
    for transformer in transformers.iter_mut() {
        let mut next = Vec::with_capacity(quads.len());
        for quad in quads {
            next.extend(transformer.transform(quad)?);
        }
        quads = next;
    }
    Ok(quads)
}

/// Ends every transformer. The first failure is returned, the rest are logged.
fn end_all(transformers: &mut [Box<dyn QuadTransformer>]) -> Result<()> {
    let mut first = None;
    for (i, transformer) in transformers.iter_mut().enumerate() {
        if let Err(e) = transformer.end() {
            if first.is_some() {
                error!("Transformer {} failed at end of input: {:#}", i, e);
            }
            first.get_or_insert(e);
        }
    }
    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct TransformState<'a> {
    input: Option<QuadStream<'a>>,
    transformers: Vec<Box<dyn QuadTransformer>>,
    pending: VecDeque<Result<Quad>>,
    seen: usize,
}

/// Applies `transformers` to every quad of `input`. A transformer error ends
/// the returned stream with that error.
pub fn transform_stream<'a>(
    input: QuadStream<'a>,
    transformers: Vec<Box<dyn QuadTransformer>>,
) -> QuadStream<'a> {
    if transformers.is_empty() {
        return input;
    }
    let state = TransformState {
        input: Some(input),
        transformers,
        pending: VecDeque::new(),
        seen: 0,
    };
    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            let input = state.input.as_mut()?;
            let next = input.next().await;
            match next {
                Some(Ok(quad)) => {
                    state.seen += 1;
                    match apply_chain(&mut state.transformers, quad) {
                        Ok(quads) => state.pending.extend(quads.into_iter().map(Ok)),
                        Err(e) => {
                            state.input = None;
                            state.pending.push_back(Err(e));
                        }
                    }
                }
                Some(Err(e)) => {
                    state.input = None;
                    return Some((Err(e), state));
                }
                None => {
                    state.input = None;
                    debug!("Transformed {} input quads", state.seen);
                    if let Err(e) = end_all(&mut state.transformers) {
                        state.pending.push_back(Err(e));
                    }
                }
            }
        }
    }))
}

pub fn transformer_from_config(config: &TransformerConfig) -> Result<Box<dyn QuadTransformer>> {
    Ok(match config {
        TransformerConfig::ReplaceIri {
            pattern,
            replacement,
        } => Box::new(ReplaceIri::new(pattern.clone(), replacement.clone())),
        TransformerConfig::RemapResourceIdentifier {
            type_pattern,
            identifier_predicate,
            target_predicate,
            separator,
        } => Box::new(RemapResourceIdentifier::new(
            type_pattern.clone(),
            identifier_predicate.clone(),
            target_predicate.clone(),
            separator.clone(),
        )),
        TransformerConfig::DistributeResources {
            type_pattern,
            target_predicate,
            delegates,
        } => {
            let delegates = delegates
                .iter()
                .map(transformer_from_config)
                .collect::<Result<Vec<_>>>()?;
            Box::new(DistributeResources::new(
                type_pattern.clone(),
                target_predicate.clone(),
                delegates,
            )?)
        }
        TransformerConfig::AppendTypeIndex {
            type_pattern,
            target_predicate,
            index_fragment,
        } => Box::new(AppendTypeIndex::new(
            type_pattern.clone(),
            target_predicate.clone(),
            index_fragment.clone(),
        )),
    })
}
