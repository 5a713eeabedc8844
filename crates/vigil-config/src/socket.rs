use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Declarative configuration for the daemon's listening socket.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Unix domain socket endpoint.
    Unix {
        /// Filesystem path of the socket.
        path: Utf8PathBuf,
    },
    /// TCP socket endpoint.
    Tcp {
        /// Host name or address to bind.
        host: String,
        /// Port to bind.
        port: u16,
    },
}

impl SocketEndpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP socket endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Returns the Unix socket path when the endpoint uses the Unix transport.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Tcp { .. } => None,
        }
    }

    /// Ensures the socket's parent directory exists with restrictive
    /// permissions. TCP endpoints need no filesystem preparation.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let Some(parent) = path.parent() else {
            return Err(SocketPreparationError::MissingParent {
                path: path.to_path_buf(),
            });
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() {
                    return Err(SocketParseError::MissingUnixPath(input.to_string()));
                }
                Ok(Self::unix(path))
            }
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| SocketParseError::MissingHost(input.to_string()))?;
                let port = url
                    .port()
                    .ok_or_else(|| SocketParseError::MissingPort(input.to_string()))?;
                Ok(Self::tcp(host, port))
            }
            other => Err(SocketParseError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Errors encountered while parsing a [`SocketEndpoint`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme was not recognised.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// TCP host name was missing.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// TCP port was missing.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// Unix socket path was missing.
    #[error("missing unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// The value was not a valid URL.
    #[error("invalid socket URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors encountered while preparing the socket filesystem.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path lacked a parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Offending socket path.
        path: Utf8PathBuf,
    },
    /// Creating the parent directory failed.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_endpoint() {
        let endpoint: SocketEndpoint = "unix:///run/vigil/vigild.sock".parse().expect("parse");
        assert_eq!(endpoint, SocketEndpoint::unix("/run/vigil/vigild.sock"));
    }

    #[test]
    fn parses_tcp_endpoint() {
        let endpoint: SocketEndpoint = "tcp://127.0.0.1:9660".parse().expect("parse");
        assert_eq!(endpoint, SocketEndpoint::tcp("127.0.0.1", 9660));
    }

    #[test]
    fn rejects_tcp_without_port() {
        let error = "tcp://127.0.0.1".parse::<SocketEndpoint>().expect_err("err");
        assert!(matches!(error, SocketParseError::MissingPort(_)));
    }

    #[test]
    fn rejects_unknown_scheme() {
        let error = "http://nope:1".parse::<SocketEndpoint>().expect_err("err");
        assert!(matches!(error, SocketParseError::UnsupportedScheme(_)));
    }

    #[test]
    fn display_round_trips() {
        let endpoint = SocketEndpoint::tcp("localhost", 9660);
        let parsed: SocketEndpoint = endpoint.to_string().parse().expect("parse");
        assert_eq!(parsed, endpoint);
    }

    #[test]
    fn prepares_unix_socket_parent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("vigild.sock");
        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8").to_string());
        endpoint.prepare_filesystem().expect("prepare");
        assert!(path.parent().expect("parent").is_dir());
    }
}
