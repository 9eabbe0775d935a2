//! Domain error types
//!
//! Each error is small and specific; fallible application paths at the facade
//! and transport level wrap these in `anyhow::Error` with context.

/// Error when a wire-format timestamp envelope is malformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Envelope shorter than the fixed 6-char prefix + 2-char suffix
    EnvelopeTooShort { len: usize },
    /// Envelope payload is not a numeric epoch count
    NonNumericPayload { payload: String },
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::EnvelopeTooShort { len } => {
                write!(
                    f,
                    "timestamp envelope has {} characters, expected at least 8",
                    len
                )
            }
            FormatError::NonNumericPayload { payload } => {
                write!(f, "timestamp envelope payload '{}' is not numeric", payload)
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Error when a timestamp input cannot be interpreted at all
///
/// This is the fatal "wrong input type" case, as opposed to [`FormatError`]
/// which covers a recognized-but-malformed wire envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedTimestamp {
    /// Description of the rejected input
    pub input: String,
}

impl std::fmt::Display for UnsupportedTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "can only parse ISO 8601 strings, dates or datetimes, got '{}'",
            self.input
        )
    }
}

impl std::error::Error for UnsupportedTimestamp {}

/// Error when extracting a declared field value from a raw record
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// Wire value was not a string where the extractor required one
    NotAString { found: String },
    /// Malformed OData timestamp envelope
    Format(FormatError),
    /// Unparseable timestamp string
    Timestamp(UnsupportedTimestamp),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::NotAString { found } => {
                write!(f, "expected a string wire value, found {}", found)
            }
            ExtractError::Format(e) => write!(f, "{}", e),
            ExtractError::Timestamp(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<FormatError> for ExtractError {
    fn from(e: FormatError) -> Self {
        ExtractError::Format(e)
    }
}

impl From<UnsupportedTimestamp> for ExtractError {
    fn from(e: UnsupportedTimestamp) -> Self {
        ExtractError::Timestamp(e)
    }
}

/// Error when a requested attribute is not set on an entity
///
/// Absent optional fields fail loudly instead of silently yielding a default,
/// so legitimate null values stay distinguishable from missing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUnavailable {
    pub attribute: String,
}

impl std::fmt::Display for AttributeUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "attribute '{}' is not available on this entity", self.attribute)
    }
}

impl std::error::Error for AttributeUnavailable {}

/// Error when a filter expression string does not match `name <op> value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedExpression {
    pub expression: String,
}

impl std::fmt::Display for MalformedExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "filter expression '{}' does not match 'name <op> value'",
            self.expression
        )
    }
}

impl std::error::Error for MalformedExpression {}

/// Error when an entity set would mix elements of different concrete types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedElements {
    pub expected: &'static str,
    pub found: &'static str,
}

impl std::fmt::Display for MixedElements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "set may only contain elements of type {}, not {}",
            self.expected, self.found
        )
    }
}

impl std::error::Error for MixedElements {}

/// Error when a custom-property union is requested over a multi-type set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeterogeneousTypes {
    /// Number of distinct discriminator values found
    pub distinct: usize,
}

impl std::fmt::Display for HeterogeneousTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot include custom properties: more than one alert type present in result ({} distinct)",
            self.distinct
        )
    }
}

impl std::error::Error for HeterogeneousTypes {}

/// Error when the post-create verification read does not return exactly one record
///
/// Signals a write/read consistency problem; never retried at this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedCreateResult {
    pub id: String,
    pub count: usize,
}

impl std::fmt::Display for UnexpectedCreateResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unexpected number of records ({}) found for newly created id '{}'",
            self.count, self.id
        )
    }
}

impl std::error::Error for UnexpectedCreateResult {}
