// Errors raised while routing quads into output documents

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    /// No routing rule accepts the given target.
    Configuration { target: String },
    /// A pending resource received a second identifier or target.
    DataIntegrity { subject: String, message: String },
    /// Resources whose type was seen but whose target never arrived.
    UnresolvedBuffer { subjects: Vec<String> },
    /// The input stream itself failed.
    Upstream { message: String },
    /// A write was attempted on a stream that has already been ended.
    StreamClosed { path: String },
    /// No serializer exists for the requested content type.
    UnsupportedContentType { content_type: String },
}

impl FragmentError {
    pub fn data_integrity(subject: impl Into<String>, message: impl Into<String>) -> Self {
        FragmentError::DataIntegrity {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn upstream(err: &anyhow::Error) -> Self {
        FragmentError::Upstream {
            message: format!("{:#}", err),
        }
    }

    /// Classifies an error item read from a quad stream. An error that
    /// already has a kind keeps it, context included; anything else is a
    /// failure of the source.
    pub fn from_stream_item(err: anyhow::Error) -> anyhow::Error {
        if err.is::<FragmentError>() {
            return err;
        }
        FragmentError::upstream(&err).into()
    }

    /// The copy of a stream error handed to each forked stream.
    pub fn for_fork(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<FragmentError>() {
            Some(kind) => kind.clone(),
            None => FragmentError::upstream(err),
        }
    }
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FragmentError::Configuration { target } => {
                write!(f, "No routing rule matches target {}", target)
            }
            FragmentError::DataIntegrity { subject, message } => {
                write!(f, "{} for resource {}", message, subject)
            }
            FragmentError::UnresolvedBuffer { subjects } => write!(
                f,
                "Detected non-identified resources: {}",
                subjects.join(", ")
            ),
            FragmentError::Upstream { message } => write!(f, "Input stream failed: {}", message),
            FragmentError::StreamClosed { path } => {
                write!(f, "Write stream for {} is already closed", path)
            }
            FragmentError::UnsupportedContentType { content_type } => {
                write!(f, "No serializer available for content type {}", content_type)
            }
        }
    }
}

impl std::error::Error for FragmentError {}
