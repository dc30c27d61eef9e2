use thiserror::Error;

/// Transport and inbound-message failures.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The transport could not be reached or refused a request.
    #[error("transport unreachable: {0}")]
    Connection(String),

    /// A message body that cannot become a telemetry sample.
    #[error("malformed message: {0}")]
    Parse(String),

    #[error("ack failed: {0}")]
    Ack(String),

    #[error("transport misconfigured: {0}")]
    Config(String),

    /// The in-process channel has no receiver or sender left.
    #[error("transport closed")]
    Closed,

    #[error("provider error: {0}")]
    Provider(String),
}
