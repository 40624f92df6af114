use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint {endpoint} answered with status {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("all upstream endpoints reported errors: {errors}")]
    EndpointsExhausted { errors: String },
    #[error("no upstream endpoint configured")]
    NoEndpoints,
    #[error("broadcast failed: {0}")]
    Broadcast(#[from] BroadcastError),
    #[error("poller task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("webhook request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("webhook rejected message with status {0}")]
    Rejected(reqwest::StatusCode),
    #[error("destination unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("authority {required} required, caller has {actual}")]
    PermissionDenied { required: u8, actual: u8 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to locate the configuration directory")]
    NoConfigDir,
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config format error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown branch `{0}`")]
    UnknownBranch(String),
}
