use std::borrow::Cow;
use std::fmt;

/// Human-readable meanings of the status codes the hub API documents.
const STATUS_TEXT: &[(u16, &str)] = &[
    (400, "The request body or request parameters are invalid."),
    (401, "The authorization information is missing or invalid."),
    (
        404,
        "No zone/device with the specified ID was found (or the state property does not exist on the specified device).",
    ),
    (502, "The hub is offline."),
    (503, "The authorization information is invalid."),
];

/// Describe an HTTP status the hub returned, falling back to the raw code.
pub fn lookup_status_error(status: u16) -> Cow<'static, str> {
    STATUS_TEXT
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, text)| Cow::Borrowed(*text))
        .unwrap_or_else(|| Cow::Owned(format!("{status} Unknown status")))
}

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Status { status: u16, message: String },
    Schema(String),
    InvalidArgument(String),
    InvalidZone(String),
    Io(std::io::Error),
}

impl Error {
    pub(crate) fn status(status: u16) -> Self {
        Error::Status {
            status,
            message: lookup_status_error(status).into_owned(),
        }
    }

    /// True for failures of the HTTP exchange itself, as opposed to bad
    /// payloads or bad arguments.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Status { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status { status, message } => write!(f, "hub returned {status}: {message}"),
            Error::Schema(msg) => write!(f, "schema error: {msg}"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::InvalidZone(id) => write!(f, "invalid zone: {id}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_status_has_text() {
        assert_eq!(lookup_status_error(502), "The hub is offline.");
    }

    #[test]
    fn unknown_status_falls_back_to_code() {
        assert_eq!(lookup_status_error(418), "418 Unknown status");
    }

    #[test]
    fn status_errors_are_transport() {
        let err = Error::status(401);
        assert!(err.is_transport());
        assert!(format!("{err}").contains("401"));
        assert!(!Error::InvalidArgument("x".into()).is_transport());
    }
}
