//! Defines constant NamedNodeRefs for the RDF and Solid vocabulary terms used while
//! rewriting and indexing resources.

use oxigraph::model::NamedNodeRef;

pub const TYPE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#type");

// solid type index
pub const TYPE_REGISTRATION: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/solid/terms#TypeRegistration");
pub const FOR_CLASS: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/solid/terms#forClass");
pub const INSTANCE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/solid/terms#instance");

/// Default number of simultaneously open output files.
pub const DEFAULT_STREAMS: usize = 128;
/// Default serialization used for output documents.
pub const DEFAULT_CONTENT_TYPE: &str = "application/n-quads";
