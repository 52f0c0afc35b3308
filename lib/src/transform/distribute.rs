use super::QuadTransformer;
use crate::resource::ResourceIdentifier;
use anyhow::{anyhow, Result};
use log::debug;
use oxigraph::model::Quad;
use regex::Regex;

/// Hands each typed resource to one of several delegate transformers, in
/// round-robin order of completion.
///
/// A resource is held back until its target is known, then every quad about
/// it, buffered and future, goes through the delegate it was assigned.
/// Quads about other subjects pass through unchanged.
pub struct DistributeResources {
    resources: ResourceIdentifier<usize>,
    delegates: Vec<Box<dyn QuadTransformer>>,
    next_delegate: usize,
}

impl DistributeResources {
    pub fn new(
        type_pattern: Regex,
        target_predicate: Regex,
        delegates: Vec<Box<dyn QuadTransformer>>,
    ) -> Result<Self> {
        if delegates.is_empty() {
            return Err(anyhow!("Resources cannot be distributed over zero delegates"));
        }
        Ok(Self {
            resources: ResourceIdentifier::new(type_pattern, target_predicate),
            delegates,
            next_delegate: 0,
        })
    }
}

impl QuadTransformer for DistributeResources {
    fn transform(&mut self, quad: Quad) -> Result<Vec<Quad>> {
        if self.resources.try_initializing_buffer(&quad) {
            return Ok(vec![]);
        }
        if self.resources.is_quad_buffered(&quad, Some(crate::QuadComponent::Subject)) {
            self.resources.try_storing_target(&quad)?;
            if !self.resources.is_complete(&quad) {
                return Ok(vec![]);
            }
            let delegate = self.next_delegate;
            self.next_delegate = (self.next_delegate + 1) % self.delegates.len();
            let mut out = vec![];
            if let Some(resource) = self.resources.apply_mapping(&quad.subject, delegate) {
                debug!("Assigned {} to delegate {}", resource.subject, delegate);
                for buffered in resource.quads {
                    out.extend(self.delegates[delegate].transform(buffered)?);
                }
            }
            return Ok(out);
        }
        match self.resources.get_mapping(&quad.subject).copied() {
            Some(delegate) => self.delegates[delegate].transform(quad),
            None => Ok(vec![quad]),
        }
    }

    fn end(&mut self) -> Result<()> {
        self.resources.on_end()?;
        for delegate in self.delegates.iter_mut() {
            delegate.end()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::TYPE;
    use crate::transform::ReplaceIri;
    use oxigraph::model::{GraphName, NamedNode, Term};

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new_unchecked(iri)
    }

    fn q(s: &str, p: NamedNode, o: impl Into<Term>) -> Quad {
        Quad::new(nn(s), p, o, GraphName::DefaultGraph)
    }

    fn distribute() -> DistributeResources {
        DistributeResources::new(
            Regex::new("Post$").unwrap(),
            Regex::new("hasCreator$").unwrap(),
            vec![
                Box::new(ReplaceIri::new(Regex::new("^ex:creator").unwrap(), "ex:first")),
                Box::new(ReplaceIri::new(Regex::new("^ex:creator").unwrap(), "ex:second")),
            ],
        )
        .unwrap()
    }

    fn post(t: &mut DistributeResources, s: &str) -> Vec<Quad> {
        let mut out = t.transform(q(s, TYPE.into_owned(), nn("ex:Post"))).unwrap();
        out.extend(t.transform(q(s, nn("ex:hasCreator"), nn("ex:creator"))).unwrap());
        out
    }

    #[test]
    fn resources_alternate_between_delegates() {
        let mut t = distribute();
        let first = post(&mut t, "ex:p1");
        let second = post(&mut t, "ex:p2");
        let third = post(&mut t, "ex:p3");
        t.end().unwrap();

        assert_eq!(first[1].object, Term::from(nn("ex:first")));
        assert_eq!(second[1].object, Term::from(nn("ex:second")));
        assert_eq!(third[1].object, Term::from(nn("ex:first")));
    }

    #[test]
    fn later_quads_follow_the_assignment() {
        let mut t = distribute();
        post(&mut t, "ex:p1");
        post(&mut t, "ex:p2");
        let out = t
            .transform(q("ex:p2", nn("ex:mentions"), nn("ex:creator")))
            .unwrap();
        assert_eq!(out[0].object, Term::from(nn("ex:second")));

        let untouched = q("ex:x", nn("ex:mentions"), nn("ex:creator"));
        assert_eq!(t.transform(untouched.clone()).unwrap(), vec![untouched]);
    }

    #[test]
    fn needs_a_delegate() {
        assert!(DistributeResources::new(
            Regex::new("Post$").unwrap(),
            Regex::new("hasCreator$").unwrap(),
            vec![]
        )
        .is_err());
    }
}
