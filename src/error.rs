#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// None of the postcode lookup services could be reached.
    #[error("Could not validate postcode")]
    ValidationUnavailable,

    #[error("Invalid postcode")]
    InvalidPostcode,

    #[error("Could not reach {addr}: {reason}")]
    PeerUnreachable { addr: String, reason: String },

    #[error("No primary replica available")]
    NoPrimaryAvailable,

    #[error("Name not found in registry: {0}")]
    NameNotFound(String),

    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Unable to parse seed state: {0}")]
    Seed(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn unreachable(addr: impl Into<String>, reason: impl ToString) -> Self {
        Error::PeerUnreachable {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Failures that come from talking to another process, these are skipped
    /// during fan-out and trigger re-election on the forwarding path.
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            Error::PeerUnreachable { .. } | Error::NoPrimaryAvailable
        )
    }

    pub fn is_naming(&self) -> bool {
        matches!(
            self,
            Error::NameNotFound(_) | Error::RegistryUnavailable(_)
        )
    }

    pub fn to_status(&self) -> tonic::Status {
        match self {
            Error::NameNotFound(_) => tonic::Status::not_found(self.to_string()),
            Error::InvalidPostcode => tonic::Status::invalid_argument(self.to_string()),
            Error::PeerUnreachable { .. }
            | Error::RegistryUnavailable(_)
            | Error::ValidationUnavailable
            | Error::NoPrimaryAvailable => tonic::Status::unavailable(self.to_string()),
            _ => tonic::Status::internal(self.to_string()),
        }
    }
}
