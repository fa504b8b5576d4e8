use std::fmt;

#[derive(Debug)]
pub enum ReportError {
    /// The request lacks a record that cannot be defaulted (customer or
    /// test summary). Surfaced to the caller; no partial artifact exists.
    MissingData(&'static str),
    /// The drawing surface or chart canvas could not be allocated or the
    /// finished document could not be serialized.
    Render(String),
    Io(std::io::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::MissingData(record) => {
                write!(f, "request has no resolvable {} record", record)
            }
            ReportError::Render(message) => write!(f, "render error: {}", message),
            ReportError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(value: std::io::Error) -> Self {
        ReportError::Io(value)
    }
}
