//! Error types for the sniper bot

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sniper bot
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("Unsupported quote mint: {0} (expected WSOL or USDC)")]
    UnsupportedQuoteMint(String),

    // RPC / network errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    // Ambiguous or missing on-chain data
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account decode failed: {0}")]
    AccountDecode(String),

    #[error("Price unavailable for {0}")]
    PriceUnavailable(String),

    #[error("Market not found for base mint {0}")]
    MarketNotFound(String),

    // Trading errors
    #[error("Transaction build failed: {0}")]
    TransactionBuild(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    #[error("Transaction {signature} failed on-chain: {reason}")]
    TransactionFailed { signature: String, reason: String },

    #[error("Transaction {0} expired before confirmation")]
    TransactionExpired(String),

    // Position management errors
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient network trouble or data
    /// that may simply not have landed yet)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_)
                | Error::RpcTimeout(_)
                | Error::Http(_)
                | Error::AccountNotFound(_)
                | Error::PriceUnavailable(_)
                | Error::MarketNotFound(_)
                | Error::TransactionSend(_)
        )
    }

    /// Check if the network accepted the transaction but it did not land
    /// successfully
    pub fn is_on_chain_failure(&self) -> bool {
        matches!(
            self,
            Error::TransactionFailed { .. } | Error::TransactionExpired(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}

impl From<solana_client::nonblocking::pubsub_client::PubsubClientError> for Error {
    fn from(e: solana_client::nonblocking::pubsub_client::PubsubClientError) -> Self {
        Error::Subscription(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Http(format!("request timed out: {}", e))
        } else {
            Error::Http(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Rpc("timeout".into()).is_retryable());
        assert!(Error::AccountNotFound("vault".into()).is_retryable());
        assert!(!Error::Config("bad".into()).is_retryable());
        assert!(!Error::TransactionFailed {
            signature: "sig".into(),
            reason: "slippage".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_on_chain_failure_classification() {
        assert!(Error::TransactionExpired("sig".into()).is_on_chain_failure());
        assert!(!Error::TransactionSend("rpc down".into()).is_on_chain_failure());
    }
}
