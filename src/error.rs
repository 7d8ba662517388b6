/// Errors that abort a wallet command.
///
/// Every variant is terminal for the current invocation. Running out of
/// owned inputs to sign is not an error; see
/// [`SignOutcome::NothingToSign`](crate::signing::SignOutcome).
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Selection could not cover the target even after exhausting every input.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Malformed address, amount or flag combination.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The ledger service call failed or returned an application error.
    #[error("{0}")]
    Remote(String),

    /// The device is absent or locked, or no seed was supplied.
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("operation cancelled by user")]
    UserCancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WalletError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        WalletError::InvalidInput(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WalletError::UserCancelled)
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        WalletError::Remote(err.to_string())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;
