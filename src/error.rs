use crate::routes::RouteEntry;
use std::path::PathBuf;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Library error types
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    ParseError { file: PathBuf, message: String },
    InvalidArgument(String),
    SerializationError(String),
    RouteDiscovery(RouteDiscoveryError),
}

/// Failure reported by a route source while walking its routes.
///
/// Routes collected before the failure are carried along so callers can
/// still document them.
#[derive(Debug)]
pub struct RouteDiscoveryError {
    pub operation: String,
    pub message: String,
    pub partial_routes: Vec<RouteEntry>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::ParseError { file, message } => {
                write!(f, "Parse error in {}: {}", file.display(), message)
            }
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::RouteDiscovery(e) => write!(f, "{}", e),
        }
    }
}

impl std::fmt::Display for RouteDiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "route discovery failed during {}: {}", self.operation, self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::RouteDiscovery(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for RouteDiscoveryError {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML: {}", err))
    }
}

impl From<syn::Error> for Error {
    fn from(err: syn::Error) -> Self {
        Error::ParseError {
            file: PathBuf::from("<unknown>"),
            message: err.to_string(),
        }
    }
}

impl From<RouteDiscoveryError> for Error {
    fn from(err: RouteDiscoveryError) -> Self {
        Error::RouteDiscovery(err)
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::IoError(err.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_io_error_keeps_kind() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        match &err {
            Error::IoError(io) => assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("denied"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_route_discovery_display() {
        let err = Error::from(RouteDiscoveryError {
            operation: "walk".to_string(),
            message: "nested router panicked".to_string(),
            partial_routes: Vec::new(),
        });
        assert_eq!(
            err.to_string(),
            "route discovery failed during walk: nested router panicked"
        );
    }
}
