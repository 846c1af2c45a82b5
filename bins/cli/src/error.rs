use errchan_shared::{ErrorEnvelope, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    Internal = 1,
    InvalidInput = 2,
    ProducerFailed = 4,
}

impl ExitCode {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(ErrorEnvelope),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(envelope) => match envelope.kind {
                ErrorKind::Expected => ExitCode::InvalidInput,
                ErrorKind::Unexpected => ExitCode::Internal,
            },
            Self::Io(_) | Self::Serialization(_) => ExitCode::Internal,
        }
    }
}
