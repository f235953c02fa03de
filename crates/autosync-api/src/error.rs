use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to bind liveness listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("liveness listener failed: {0}")]
    Serve(#[from] std::io::Error),
}
