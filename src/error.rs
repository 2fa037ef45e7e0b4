use std::{error::Error, io, net::SocketAddr, path::PathBuf};
use thiserror::Error;

pub type Result<T, E = ServeError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum ServeError {
    /// The address is already bound by another listener
    #[error("port {port} is already in use")]
    PortUnavailable { port: u16 },

    /// Any other failure while binding the listener
    #[error("could not start server on {addr}: {source}")]
    StartupFailure {
        addr: SocketAddr,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    /// The root directory is missing or unreadable
    #[error("cannot serve {}: {source}", path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid response header {name:?}")]
    InvalidHeader { name: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} is outside the served directory")]
    Forbidden(String),

    #[error("method {0} is not supported")]
    UnsupportedMethod(String),
}

impl ServeError {
    /// Status code for the per-request variants; startup errors never reach a client.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::UnsupportedMethod(_) => 501,
            _ => 500,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self.status_code() {
            404 => "Not Found",
            403 => "Forbidden",
            501 => "Not Implemented",
            _ => "Internal Server Error",
        }
    }

    pub(crate) fn from_io(error: io::Error, path: &str) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::Forbidden(path.to_owned()),
            _ => Self::NotFound(path.to_owned()),
        }
    }
}
