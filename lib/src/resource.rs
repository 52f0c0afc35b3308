//! Buffer-until-complete assembly of typed resources.
//!
//! A resource starts buffering when a `rdf:type` quad with a matching type is
//! seen for its subject. Every later quad about that subject is appended to the
//! buffer until the target (and, when configured, the identifier) are known.
//! The caller then installs a mapping with [`ResourceIdentifier::apply_mapping`]
//! and replays the buffered quads through it. Quads that arrive after that
//! point find the mapping through [`ResourceIdentifier::for_each_mapped_resource`].
//!
//! The payload type `T` is whatever the caller needs once a resource is known:
//! a new IRI, the index of a delegate, or simply a marker.

use crate::consts::TYPE;
use crate::errors::FragmentError;
use crate::QuadComponent;
use anyhow::Result;
use log::debug;
use oxigraph::model::{NamedNode, NamedOrBlankNode, Quad, Term};
use regex::Regex;
use std::collections::HashMap;

/// Key used for subjects and objects in the buffer and mapping tables.
/// Blank nodes carry their `_:` prefix so they never collide with IRIs.
pub fn subject_key(subject: &NamedOrBlankNode) -> String {
    match subject {
        NamedOrBlankNode::NamedNode(n) => n.as_str().to_string(),
        NamedOrBlankNode::BlankNode(b) => format!("_:{}", b.as_str()),
    }
}

fn object_key(object: &Term) -> Option<String> {
    match object {
        Term::NamedNode(n) => Some(n.as_str().to_string()),
        Term::BlankNode(b) => Some(format!("_:{}", b.as_str())),
        _ => None,
    }
}

/// A resource whose type is known but whose identity is not complete yet.
#[derive(Debug, Clone)]
pub struct PendingResource {
    pub subject: NamedOrBlankNode,
    pub quads: Vec<Quad>,
    pub resource_type: NamedNode,
    pub identifier: Option<Term>,
    pub target: Option<NamedNode>,
}

#[derive(Debug)]
pub struct ResourceIdentifier<T> {
    type_pattern: Regex,
    target_predicate: Regex,
    identifier_predicate: Option<Regex>,
    buffer: HashMap<String, PendingResource>,
    mapping: HashMap<String, T>,
}

impl<T> ResourceIdentifier<T> {
    pub fn new(type_pattern: Regex, target_predicate: Regex) -> Self {
        Self {
            type_pattern,
            target_predicate,
            identifier_predicate: None,
            buffer: HashMap::new(),
            mapping: HashMap::new(),
        }
    }

    /// Also require an identifier value before a resource counts as complete.
    pub fn with_identifier_predicate(mut self, identifier_predicate: Regex) -> Self {
        self.identifier_predicate = Some(identifier_predicate);
        self
    }

    /// Starts buffering the subject of `quad` if it is a type assertion for a
    /// matching type. Returns true when a new buffer was created.
    pub fn try_initializing_buffer(&mut self, quad: &Quad) -> bool {
        if quad.predicate.as_ref() != TYPE {
            return false;
        }
        let Term::NamedNode(resource_type) = &quad.object else {
            return false;
        };
        if !self.type_pattern.is_match(resource_type.as_str()) {
            return false;
        }
        let key = subject_key(&quad.subject);
        if self.buffer.contains_key(&key) || self.mapping.contains_key(&key) {
            return false;
        }
        debug!("Buffering resource {} of type {}", key, resource_type);
        self.buffer.insert(
            key,
            PendingResource {
                subject: quad.subject.clone(),
                quads: vec![quad.clone()],
                resource_type: resource_type.clone(),
                identifier: None,
                target: None,
            },
        );
        true
    }

    /// Returns which component of `quad` refers to a buffered resource.
    /// The subject is checked before the object; `allowed_component` restricts
    /// the check to one of the two.
    pub fn buffered_component(
        &self,
        quad: &Quad,
        allowed_component: Option<QuadComponent>,
    ) -> Option<QuadComponent> {
        let subject_allowed = allowed_component.map_or(true, |c| c == QuadComponent::Subject);
        if subject_allowed && self.buffer.contains_key(&subject_key(&quad.subject)) {
            return Some(QuadComponent::Subject);
        }
        let object_allowed = allowed_component.map_or(true, |c| c == QuadComponent::Object);
        if object_allowed {
            if let Some(key) = object_key(&quad.object) {
                if self.buffer.contains_key(&key) {
                    return Some(QuadComponent::Object);
                }
            }
        }
        None
    }

    pub fn is_quad_buffered(&self, quad: &Quad, allowed_component: Option<QuadComponent>) -> bool {
        self.buffered_component(quad, allowed_component).is_some()
    }

    /// The pending resource for the subject of `quad`.
    pub fn get_buffer_resource(&self, quad: &Quad) -> Option<&PendingResource> {
        self.buffer.get(&subject_key(&quad.subject))
    }

    /// Records the identifier value if the predicate of `quad` is the
    /// identifier predicate. Does not buffer the quad itself.
    pub fn try_storing_identifier(&mut self, quad: &Quad) -> Result<bool> {
        let Some(pattern) = &self.identifier_predicate else {
            return Ok(false);
        };
        if !pattern.is_match(quad.predicate.as_str()) {
            return Ok(false);
        }
        let key = subject_key(&quad.subject);
        let resource = self.buffer.get_mut(&key).ok_or_else(|| {
            anyhow::anyhow!("Resource {} is not being buffered", key)
        })?;
        if resource.identifier.is_some() {
            return Err(FragmentError::data_integrity(key, "Detected multiple identifiers").into());
        }
        resource.identifier = Some(quad.object.clone());
        Ok(true)
    }

    /// Appends `quad` to the buffer of its subject. If the predicate is the
    /// target predicate, the object becomes the target of the resource.
    pub fn try_storing_target(&mut self, quad: &Quad) -> Result<bool> {
        let key = subject_key(&quad.subject);
        let resource = self.buffer.get_mut(&key).ok_or_else(|| {
            anyhow::anyhow!("Resource {} is not being buffered", key)
        })?;
        resource.quads.push(quad.clone());
        if !self.target_predicate.is_match(quad.predicate.as_str()) {
            return Ok(false);
        }
        if resource.target.is_some() {
            return Err(FragmentError::data_integrity(key, "Detected multiple targets").into());
        }
        match &quad.object {
            Term::NamedNode(target) => {
                resource.target = Some(target.clone());
                Ok(true)
            }
            other => Err(FragmentError::data_integrity(
                key,
                format!("Target {} is not a named node", other),
            )
            .into()),
        }
    }

    /// Appends `quad` to the buffer of the resource found at `component`,
    /// without inspecting its predicate. Used for quads that merely refer to a
    /// pending resource.
    pub fn append_to_buffer(&mut self, quad: &Quad, component: QuadComponent) -> Result<()> {
        let key = match component {
            QuadComponent::Subject => Some(subject_key(&quad.subject)),
            QuadComponent::Object => object_key(&quad.object),
            _ => None,
        };
        let resource = key
            .as_ref()
            .and_then(|key| self.buffer.get_mut(key))
            .ok_or_else(|| anyhow::anyhow!("No pending resource at the {} of {}", component, quad))?;
        resource.quads.push(quad.clone());
        Ok(())
    }

    /// True once the subject of `quad` has every part of its identity.
    pub fn is_complete(&self, quad: &Quad) -> bool {
        self.get_buffer_resource(quad).is_some_and(|resource| {
            resource.target.is_some()
                && (self.identifier_predicate.is_none() || resource.identifier.is_some())
        })
    }

    /// Invokes `callback` for the subject and object of `quad` when they
    /// already have an installed mapping.
    pub fn for_each_mapped_resource<F>(&self, quad: &Quad, mut callback: F) -> Result<()>
    where
        F: FnMut(&T, QuadComponent) -> Result<()>,
    {
        if let Some(mapping) = self.mapping.get(&subject_key(&quad.subject)) {
            callback(mapping, QuadComponent::Subject)?;
        }
        if let Some(mapping) = object_key(&quad.object).and_then(|key| self.mapping.get(&key)) {
            callback(mapping, QuadComponent::Object)?;
        }
        Ok(())
    }

    pub fn get_mapping(&self, subject: &NamedOrBlankNode) -> Option<&T> {
        self.mapping.get(&subject_key(subject))
    }

    /// Removes the pending resource for `subject` and installs `mapping` in its
    /// place. The removed resource is returned so its quads can be replayed.
    pub fn apply_mapping(&mut self, subject: &NamedOrBlankNode, mapping: T) -> Option<PendingResource> {
        let key = subject_key(subject);
        let resource = self.buffer.remove(&key);
        self.mapping.insert(key, mapping);
        resource
    }

    pub fn num_buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn num_mapped(&self) -> usize {
        self.mapping.len()
    }

    /// Fails if any resource is still buffering.
    pub fn on_end(&self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let mut subjects: Vec<String> = self.buffer.keys().cloned().collect();
        subjects.sort();
        Err(FragmentError::UnresolvedBuffer { subjects }.into())
    }
}
