use thiserror::Error;

/// Validation failures raised while constructing a domain value directly
/// (outside of a store round-trip). The API layer maps every variant to
/// `400 Bad Request`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("node id must match [A-Za-z0-9_-]{{3,64}}, got {0:?}")]
    InvalidNodeId(String),

    #[error("hardware fingerprint must be nonempty and at most 128 chars")]
    InvalidHardwareFingerprint,

    #[error("ip address {0:?} is not a valid IPv4 or IPv6 literal")]
    InvalidIpAddress(String),

    #[error("job name must be 1-200 chars")]
    InvalidJobName,

    #[error("job parameters exceed 64 KiB")]
    ParametersTooLarge,

    #[error("job type must not be Unknown")]
    UnknownJobType,

    #[error("{0:?} is not a recognized job status")]
    InvalidJobStatus(String),

    #[error("file path is empty after trimming")]
    EmptyFilePath,

    #[error("normalized file path exceeds 1024 chars")]
    FilePathTooLong,
}
