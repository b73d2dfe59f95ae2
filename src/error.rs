use std::fmt;
use std::sync::Arc;

/// Sources are shared so the same error can reach both an event listener and
/// the caller.
#[derive(Debug, Clone)]
pub enum Error {
    Config(String),
    Auth(String),
    Api(String),
    DeferredCallAbandoned(String),
    Http(Arc<reqwest::Error>),
    Io(Arc<std::io::Error>),
    Yaml(Arc<serde_yaml::Error>),
    Json(Arc<serde_json::Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Auth(msg) => write!(f, "Authentication error: {}", msg),
            Error::Api(msg) => write!(f, "API error: {}", msg),
            Error::DeferredCallAbandoned(op) => {
                write!(f, "Deferred call abandoned before authentication: {}", op)
            }
            Error::Http(err) => write!(f, "HTTP error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Yaml(err) => write!(f, "YAML parsing error: {}", err),
            Error::Json(err) => write!(f, "JSON parsing error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(err) => Some(err.as_ref()),
            Error::Io(err) => Some(err.as_ref()),
            Error::Yaml(err) => Some(err.as_ref()),
            Error::Json(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(Arc::new(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let err = Error::Config("getMeasure 'device_id' not set.".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: getMeasure 'device_id' not set."
        );

        let err = Error::Api("getStationsData error: Invalid access token".to_string());
        assert!(err.to_string().contains("Invalid access token"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
