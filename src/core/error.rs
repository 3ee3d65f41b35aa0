//! Purpose: Single error type shared by the mapping engine, the public API and the CLI.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Typed, builder-style error carrying the failing field chain and destination path.
//! Invariants: Engine failures are one of `InvalidTag`, `Unaddressable`, `TypeMismatch`, `Encode`.
//! Invariants: Exit code mapping is stable once published.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Io,
    /// Malformed path or modifier grammar in a tag.
    InvalidTag,
    /// A destination location cannot be reached or set.
    Unaddressable,
    /// A value is not assignable to the destination field.
    TypeMismatch,
    /// A value could not be projected into a tree by serde.
    Encode,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    field: Option<String>,
    path: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            field: None,
            path: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Dotted chain of tagged field names leading to the failure, outermost first.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Records that the failure happened inside `name`. Called from the innermost
    /// field outwards, so the chain reads `Outer.Inner`.
    pub fn in_field(mut self, name: &str) -> Self {
        self.field = Some(match self.field.take() {
            Some(inner) => format!("{name}.{inner}"),
            None => name.to_string(),
        });
        self
    }

    pub(crate) fn invalid_tag(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidTag).with_message(message)
    }

    pub(crate) fn unaddressable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unaddressable).with_message(message)
    }

    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch).with_message(message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {field})")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {path})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::InvalidTag => 3,
        ErrorKind::Unaddressable => 4,
        ErrorKind::TypeMismatch => 5,
        ErrorKind::Encode => 6,
        ErrorKind::Io => 7,
    }
}
