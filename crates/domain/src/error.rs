/// Shared error type for infrastructure failures — configuration, I/O,
/// and external calls. Turn-time business failures (invalid parameters,
/// a downstream 4xx, an unresolved route) are never raised through this
/// type; they travel as typed `Result` fields on the relevant response
/// (see `ToolResult`, `RoutingOutcome`). This type is reserved for
/// failures that abort the operation outright.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
