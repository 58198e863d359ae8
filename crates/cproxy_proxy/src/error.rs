use std::time::Duration;

/// Failure talking to the origin.
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("failed to connect to origin {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with origin {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("origin did not answer within {0:?}")]
    Timeout(Duration),

    #[error("origin exchange failed: {0}")]
    Exchange(#[from] hyper::Error),

    #[error("invalid origin request: {0}")]
    InvalidRequest(#[from] http::Error),

    #[error("failed to read origin response body: {0}")]
    Body(#[source] hyper::Error),

    #[error("origin response body not received within {0:?}")]
    BodyTimeout(Duration),
}

impl OriginError {
    /// The origin could not be reached or did not answer in time.
    ///
    /// Everything else (bad request, broken body) is a local failure.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            OriginError::Connect { .. }
                | OriginError::Tls { .. }
                | OriginError::Timeout(_)
                | OriginError::Exchange(_)
        )
    }
}
