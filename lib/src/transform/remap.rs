use super::QuadTransformer;
use crate::resource::ResourceIdentifier;
use crate::{term_ref, QuadComponent};
use anyhow::{anyhow, Context, Result};
use log::debug;
use oxigraph::model::{NamedNode, NamedOrBlankNode, Quad, Term};
use regex::Regex;

/// Renames typed resources after their target and identifier.
///
/// A resource of a matching type is held back until both its identifier value
/// and its target IRI are known. It is then renamed to
/// `target + separator + identifier` and its quads are released with the new
/// name. Quads that refer to a pending resource as their object wait with it;
/// later references to a renamed resource are rewritten as they arrive.
pub struct RemapResourceIdentifier {
    resources: ResourceIdentifier<NamedNode>,
    separator: String,
}

impl RemapResourceIdentifier {
    pub fn new(
        type_pattern: Regex,
        identifier_predicate: Regex,
        target_predicate: Regex,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            resources: ResourceIdentifier::new(type_pattern, target_predicate)
                .with_identifier_predicate(identifier_predicate),
            separator: separator.into(),
        }
    }

    /// Replaces every renamed resource in `quad` with its new IRI.
    fn rewrite(&self, quad: Quad) -> Result<Quad> {
        let mut subject: NamedOrBlankNode = quad.subject.clone();
        let mut object: Term = quad.object.clone();
        self.resources
            .for_each_mapped_resource(&quad, |iri, component| {
                match component {
                    QuadComponent::Subject => subject = iri.clone().into(),
                    _ => object = iri.clone().into(),
                }
                Ok(())
            })?;
        Ok(Quad::new(subject, quad.predicate, object, quad.graph_name))
    }

    /// Rewrites a released quad, unless it still refers to another pending
    /// resource, in which case it waits in that resource's buffer.
    fn release(&mut self, quad: Quad, out: &mut Vec<Quad>) -> Result<()> {
        if self
            .resources
            .is_quad_buffered(&quad, Some(QuadComponent::Object))
        {
            return self.resources.append_to_buffer(&quad, QuadComponent::Object);
        }
        out.push(self.rewrite(quad)?);
        Ok(())
    }

    fn new_iri(&self, quad: &Quad) -> Result<NamedNode> {
        let resource = self
            .resources
            .get_buffer_resource(quad)
            .ok_or_else(|| anyhow!("{} is not pending", quad.subject))?;
        let (Some(target), Some(identifier)) = (&resource.target, &resource.identifier) else {
            return Err(anyhow!("{} is not complete", quad.subject));
        };
        let value = term_ref(identifier)
            .value()
            .ok_or_else(|| anyhow!("Identifier of {} has no value", quad.subject))?;
        let iri = format!("{}{}{}", target.as_str(), self.separator, value);
        NamedNode::new(iri.as_str())
            .with_context(|| format!("Cannot rename {} to {}", quad.subject, iri))
    }
}

impl QuadTransformer for RemapResourceIdentifier {
    fn transform(&mut self, quad: Quad) -> Result<Vec<Quad>> {
        if self.resources.try_initializing_buffer(&quad) {
            return Ok(vec![]);
        }
        match self.resources.buffered_component(&quad, None) {
            Some(QuadComponent::Subject) => {
                self.resources.try_storing_identifier(&quad)?;
                self.resources.try_storing_target(&quad)?;
                if !self.resources.is_complete(&quad) {
                    return Ok(vec![]);
                }
                let iri = self.new_iri(&quad)?;
                let mut out = vec![];
                if let Some(resource) = self.resources.apply_mapping(&quad.subject, iri.clone()) {
                    debug!(
                        "Renamed {} to {}, releasing {} quads",
                        resource.subject,
                        iri,
                        resource.quads.len()
                    );
                    for buffered in resource.quads {
                        self.release(buffered, &mut out)?;
                    }
                }
                Ok(out)
            }
            Some(component) => {
                self.resources.append_to_buffer(&quad, component)?;
                Ok(vec![])
            }
            None => Ok(vec![self.rewrite(quad)?]),
        }
    }

    fn end(&mut self) -> Result<()> {
        self.resources.on_end()
    }
}
