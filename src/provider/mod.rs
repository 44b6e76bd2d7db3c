//! Wallet provider boundary.
//!
//! A provider is whatever the operator's wallet exposes: in the browser that
//! is the EIP-1193 object at `window.ethereum`, natively it is the in-process
//! [`DevWallet`](crate::devnet::DevWallet).
//!
//! ```text
//! WalletProvider (trait, EIP-1193 shaped)
//!     │
//!     ├── is_present          presence detection
//!     ├── request_accounts    eth_requestAccounts (prompts the operator)
//!     ├── subscribe_accounts  accountsChanged → ordered channel
//!     ├── call                eth_call (read-only)
//!     ├── send_transaction    eth_sendTransaction (prompts for a signature)
//!     └── wait_for_receipt    eth_getTransactionReceipt until mined
//!             │
//!             ▼
//!     ProviderGateway (detect, request access, AccountChanges)
//! ```

mod gateway;
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
mod eip1193;

pub use gateway::{AccountChange, AccountChanges, ProviderGateway, WalletAvailability};
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use eip1193::Eip1193Provider;

use crate::error::ProviderError;
use alloy_primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use futures::channel::mpsc;
use serde::Serialize;

/// A state-changing call the wallet is asked to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl TxRequest {
    pub fn new(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self { from, to, value: U256::ZERO, data: data.into() }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait WalletProvider {
    /// Whether a wallet capability is installed at all.
    fn is_present(&self) -> bool;

    /// Ask the operator for account access. Returns the accounts in the
    /// wallet's order; the first one is the active identity.
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Every change to the wallet's account set, in emission order. An empty
    /// vector means the wallet no longer exposes any account.
    fn subscribe_accounts(&self) -> mpsc::UnboundedReceiver<Vec<Address>>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError>;

    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash, ProviderError>;

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt, ProviderError>;
}
