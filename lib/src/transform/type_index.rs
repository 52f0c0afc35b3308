use super::QuadTransformer;
use crate::consts::{FOR_CLASS, INSTANCE, TYPE, TYPE_REGISTRATION};
use crate::resource::{PendingResource, ResourceIdentifier};
use anyhow::{anyhow, Context, Result};
use oxigraph::model::{GraphName, NamedNode, Quad};
use regex::Regex;

/// Registers typed resources in a Solid type index next to their target.
///
/// Once a resource's target is known its quads are released together with a
/// registration at `<target#fragment>` that links the resource to its class.
pub struct AppendTypeIndex {
    resources: ResourceIdentifier<bool>,
    index_fragment: Option<String>,
}

impl AppendTypeIndex {
    pub fn new(type_pattern: Regex, target_predicate: Regex, index_fragment: Option<String>) -> Self {
        Self {
            resources: ResourceIdentifier::new(type_pattern, target_predicate),
            index_fragment,
        }
    }

    /// `index-<local name of the class>` unless a fixed fragment is configured.
    fn fragment(&self, class: &NamedNode) -> String {
        if let Some(fragment) = &self.index_fragment {
            return fragment.clone();
        }
        let iri = class.as_str();
        let local = iri
            .rsplit(|c| c == '#' || c == '/')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or("resource");
        format!("index-{}", local)
    }

    fn registration(&self, resource: &PendingResource) -> Result<Vec<Quad>> {
        let target = resource
            .target
            .as_ref()
            .ok_or_else(|| anyhow!("{} has no target", resource.subject))?;
        let document = target.as_str().split('#').next().unwrap_or_default();
        let iri = format!("{}#{}", document, self.fragment(&resource.resource_type));
        let registration = NamedNode::new(iri.as_str())
            .with_context(|| format!("Invalid type registration IRI {}", iri))?;
        let graph = resource
            .quads
            .first()
            .map(|quad| quad.graph_name.clone())
            .unwrap_or(GraphName::DefaultGraph);
        Ok(vec![
            Quad::new(
                registration.clone(),
                TYPE.into_owned(),
                TYPE_REGISTRATION.into_owned(),
                graph.clone(),
            ),
            Quad::new(
                registration.clone(),
                FOR_CLASS.into_owned(),
                resource.resource_type.clone(),
                graph.clone(),
            ),
            Quad::new(registration, INSTANCE.into_owned(), resource.subject.clone(), graph),
        ])
    }
}

impl QuadTransformer for AppendTypeIndex {
    fn transform(&mut self, quad: Quad) -> Result<Vec<Quad>> {
        if self.resources.try_initializing_buffer(&quad) {
            return Ok(vec![]);
        }
        if !self
            .resources
            .is_quad_buffered(&quad, Some(crate::QuadComponent::Subject))
        {
            return Ok(vec![quad]);
        }
        self.resources.try_storing_target(&quad)?;
        if !self.resources.is_complete(&quad) {
            return Ok(vec![]);
        }
        match self.resources.apply_mapping(&quad.subject, true) {
            Some(resource) => {
                let mut out = self.registration(&resource)?;
                out.extend(resource.quads);
                Ok(out)
            }
            None => Ok(vec![]),
        }
    }

    fn end(&mut self) -> Result<()> {
        self.resources.on_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{Literal, Term};

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new_unchecked(iri)
    }

    fn q(s: &str, p: NamedNode, o: impl Into<Term>) -> Quad {
        Quad::new(nn(s), p, o, GraphName::DefaultGraph)
    }

    #[test]
    fn appends_a_registration_per_resource() {
        let mut t = AppendTypeIndex::new(
            Regex::new("vocab#Post$").unwrap(),
            Regex::new("vocab#hasCreator$").unwrap(),
            None,
        );
        assert!(t
            .transform(q("ex:p1", TYPE.into_owned(), nn("http://ex.org/vocab#Post")))
            .unwrap()
            .is_empty());
        assert!(t
            .transform(q("ex:p1", nn("ex:content"), Literal::new_simple_literal("hi")))
            .unwrap()
            .is_empty());
        let out = t
            .transform(q("ex:p1", nn("http://ex.org/vocab#hasCreator"), nn("http://ex.org/alice")))
            .unwrap();
        t.end().unwrap();

        assert_eq!(out.len(), 6);
        let registration = nn("http://ex.org/alice#index-Post");
        assert!(out.contains(&q(
            registration.as_str(),
            INSTANCE.into_owned(),
            nn("ex:p1")
        )));
        assert!(out.contains(&q(
            registration.as_str(),
            FOR_CLASS.into_owned(),
            nn("http://ex.org/vocab#Post")
        )));

        // later quads about the resource pass straight through
        let later = q("ex:p1", nn("ex:date"), Literal::new_simple_literal("today"));
        assert_eq!(t.transform(later.clone()).unwrap(), vec![later]);
    }

    #[test]
    fn fixed_fragment() {
        let t = AppendTypeIndex::new(
            Regex::new(".*").unwrap(),
            Regex::new(".*").unwrap(),
            Some("posts".to_string()),
        );
        assert_eq!(t.fragment(&nn("http://ex.org/vocab#Post")), "posts");
    }
}
