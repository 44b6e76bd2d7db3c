//! Error taxonomy. Every failure is caught at the boundary of the operation
//! that produced it and rendered into the single error banner.

use crate::coordinator::OperationKind;
use alloy_primitives::TxHash;
use thiserror::Error;

/// EIP-1193 code for "user rejected the request".
pub const USER_REJECTED: i64 = 4001;
/// EIP-1193 code for "the requested account has not been authorized".
pub const UNAUTHORIZED: i64 = 4100;

/// Failures reported by a wallet provider, before any interpretation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The operator declined a prompt (account access or signing).
    #[error("{message}")]
    Rejected { code: i64, message: String },

    /// JSON-RPC error returned by the wallet or the node behind it.
    #[error("{message}")]
    Rpc { code: i64, message: String },

    /// The provider could not be reached or returned something unreadable.
    #[error("{0}")]
    Transport(String),
}

impl ProviderError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected { code: USER_REJECTED, message: message.into() }
    }

    /// Classify a raw `{code, message}` pair the way EIP-1193 defines it.
    pub fn from_code(code: i64, message: impl Into<String>) -> Self {
        match code {
            USER_REJECTED | UNAUTHORIZED => Self::Rejected { code, message: message.into() },
            _ => Self::Rpc { code, message: message.into() },
        }
    }
}

/// Where an error came from; drives whether the operator can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Wallet capability absent. Terminal.
    Environment,
    /// Operator declined account access or signing.
    Authorization,
    /// Malformed amount or recipient. Local, no network round-trip.
    Validation,
    /// Revert, failed confirmation, RPC failure.
    Ledger,
    /// Operation issued against the wrong session state.
    Session,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("Wallet provider not found. Please install or enable a browser wallet.")]
    ProviderNotFound,

    #[error("{0}")]
    Rejected(String),

    #[error("No accounts found. Please connect your wallet.")]
    NoAccounts,

    #[error("Ledger contract not initialized. Connect a wallet first.")]
    NotConnected,

    #[error("Wallet session changed; reconnect before continuing.")]
    StaleHandle,

    #[error("Cannot {action} while {state}.")]
    InvalidState { action: &'static str, state: &'static str },

    #[error("Please enter a valid amount.")]
    InvalidAmount,

    #[error("Please enter a valid recipient address.")]
    InvalidRecipient,

    #[error("A {0} is already in progress.")]
    Busy(OperationKind),

    #[error("Wallet account changed or disconnected before the {0} was confirmed; its outcome is unknown.")]
    Abandoned(OperationKind),

    #[error("Transaction {0} reverted.")]
    Reverted(TxHash),

    #[error("{0}")]
    Ledger(String),

    #[error("Unexpected contract response: {0}")]
    Decode(String),

    #[error("internal state lock poisoned")]
    Lock,
}

impl WalletError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderNotFound => ErrorCategory::Environment,
            Self::Rejected(_) | Self::NoAccounts => ErrorCategory::Authorization,
            Self::InvalidAmount | Self::InvalidRecipient => ErrorCategory::Validation,
            Self::Reverted(_) | Self::Ledger(_) | Self::Decode(_) => ErrorCategory::Ledger,
            Self::NotConnected
            | Self::StaleHandle
            | Self::InvalidState { .. }
            | Self::Busy(_)
            | Self::Abandoned(_)
            | Self::Lock => ErrorCategory::Session,
        }
    }

    /// Only a missing wallet is terminal; everything else can be retried by
    /// the operator.
    pub fn is_recoverable(&self) -> bool {
        self.category() != ErrorCategory::Environment
    }
}

impl From<ProviderError> for WalletError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected { message, .. } => Self::Rejected(message),
            ProviderError::Rpc { message, .. } => Self::Ledger(message),
            ProviderError::Transport(message) => Self::Ledger(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
