//! XML codec error types.

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, XmlError>;

/// Errors raised while decoding Jenkins configuration documents.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// The document has no root element.
    #[error("document has no root element")]
    Empty,

    /// A required attribute is missing from an element.
    #[error("element '{element}' is missing attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    /// The root element is not the one the document type expects.
    #[error("unexpected root element '{found}', expected '{expected}'")]
    UnexpectedRoot { expected: String, found: String },

    /// A leaf element holds a value that cannot be parsed.
    #[error("invalid value for '{field}': '{value}'")]
    InvalidValue { field: String, value: String },
}

impl XmlError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<quick_xml::Error> for XmlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::malformed(err)
    }
}

impl From<quick_xml::escape::EscapeError> for XmlError {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        Self::malformed(err)
    }
}
