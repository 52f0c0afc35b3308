//! Routing for quads whose key is a blank node.
//!
//! A blank node has no document of its own, so a quad keyed by one belongs to
//! whichever named resource refers to it. Ownership is learned while the
//! stream is routed: each time a quad with a named key has a blank node as its
//! value, the key's target becomes an owner of that blank node. Quads keyed by
//! blank nodes are held back until [`BlankNodeOwnershipResolver::flush`], which
//! passes ownership along chains of blank nodes until nothing changes and then
//! replays each held quad to every owner, regardless of arrival order.
//!
//! Both tables are keyed by blank node label; there is no object graph, so
//! cycles without a named anchor simply stay unresolved.

use crate::sink::QuadSink;
use crate::{component, ComponentRef, QuadComponent};
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use oxigraph::model::Quad;
use std::collections::HashMap;

#[derive(Debug)]
pub struct BlankNodeOwnershipResolver {
    key: QuadComponent,
    value: QuadComponent,
    pending: HashMap<String, Vec<Quad>>,
    owners: HashMap<String, Vec<String>>,
}

impl BlankNodeOwnershipResolver {
    /// `key` is the component quads are routed by: subject or object.
    pub fn new(key: QuadComponent) -> Result<Self> {
        let value = match key {
            QuadComponent::Subject => QuadComponent::Object,
            QuadComponent::Object => QuadComponent::Subject,
            other => return Err(anyhow!("Cannot route blank nodes by {}", other)),
        };
        Ok(Self {
            key,
            value,
            pending: HashMap::new(),
            owners: HashMap::new(),
        })
    }

    /// Holds `quad` back if its key is a blank node. Returns whether it did.
    pub fn push(&mut self, quad: &Quad) -> bool {
        match component(quad, self.key) {
            ComponentRef::Blank(label) => {
                self.pending
                    .entry(label.to_string())
                    .or_default()
                    .push(quad.clone());
                true
            }
            _ => false,
        }
    }

    /// Records `owner` as an owner of the value of `quad` when that value is a
    /// blank node. Called for every quad routed to `owner`.
    pub fn materialize_value_for_named_key(&mut self, quad: &Quad, owner: &str) {
        if let ComponentRef::Blank(label) = component(quad, self.value) {
            let owners = self.owners.entry(label.to_string()).or_default();
            if !owners.iter().any(|o| o == owner) {
                owners.push(owner.to_string());
            }
        }
    }

    /// Blank node labels with quads still waiting for an owner.
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    /// Replays every held quad to every owner of its blank node and returns
    /// how many quads were dropped.
    ///
    /// Ownership is first propagated along held quads until it stops
    /// changing: when a quad keyed by `_:a` has `_:b` as its value, every
    /// owner of `_:a` also owns `_:b`. Each label is then replayed once to its
    /// complete owner set, so the result does not depend on label names.
    /// Quads without a named anchor are dropped with a warning per quad.
    pub async fn flush(&mut self, sink: &dyn QuadSink) -> Result<usize> {
        let mut labels: Vec<String> = self.pending.keys().cloned().collect();
        labels.sort();

        let value = self.value;
        let mut edges: Vec<(String, String)> = Vec::new();
        for label in &labels {
            for quad in &self.pending[label] {
                if let ComponentRef::Blank(inner) = component(quad, value) {
                    edges.push((label.clone(), inner.to_string()));
                }
            }
        }

        let mut passes = 0;
        loop {
            passes += 1;
            let mut changed = false;
            for (from, to) in &edges {
                let inherited = match self.owners.get(from) {
                    Some(owners) if !owners.is_empty() => owners.clone(),
                    _ => continue,
                };
                let owners = self.owners.entry(to.clone()).or_default();
                for owner in inherited {
                    if !owners.contains(&owner) {
                        owners.push(owner);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        debug!("Blank node ownership settled after {} passes", passes);

        let mut dropped = 0;
        for label in labels {
            let Some(quads) = self.pending.remove(&label) else {
                continue;
            };
            match self.owners.get(&label).filter(|owners| !owners.is_empty()) {
                Some(owners) => {
                    for quad in &quads {
                        for owner in owners {
                            sink.push(owner, quad).await?;
                        }
                    }
                }
                None => {
                    for quad in quads {
                        warn!(
                            "Dropping quad with unresolved blank node _:{}: {}",
                            label, quad
                        );
                        dropped += 1;
                    }
                }
            }
        }
        if dropped > 0 {
            info!("Dropped {} quads with unresolved blank nodes", dropped);
        }
        Ok(dropped)
    }
}
