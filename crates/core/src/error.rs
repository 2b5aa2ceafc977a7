use thiserror::Error;

/// Why a decoded plaintext is not a usable `host:port` address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address is empty")]
    Empty,

    #[error("Missing :port suffix")]
    MissingPort,

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Missing closing bracket in IPv6 address")]
    UnclosedBracket,

    #[error("Address contains a line break")]
    LineBreak,
}

pub type Result<T> = std::result::Result<T, AddressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_port() {
        let err = AddressError::InvalidPort("http".to_string());
        assert_eq!(err.to_string(), "Invalid port: http");
    }

    #[test]
    fn test_error_display_missing_port() {
        assert_eq!(AddressError::MissingPort.to_string(), "Missing :port suffix");
    }
}
