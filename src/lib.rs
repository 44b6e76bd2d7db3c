//! Ledgerlink: wallet session and ledger transaction client.
//!
//! Connects an operator's wallet, binds the ledger contract to the active
//! account, and drives deposits, withdrawals and transfers one at a time.
//!
//! # Architecture
//!
//! ```text
//! Client (entry point)
//!   │
//!   ├── SessionManager ──── ProviderGateway ──── WalletProvider
//!   │     Disconnected → ReadyToConnect          (window.ethereum / DevWallet)
//!   │       → Connecting → Connected
//!   │
//!   ├── ContractBinding → ContractHandle (signer + epoch)
//!   │
//!   ├── TransactionCoordinator (one operation in flight)
//!   │     Validating → Submitted → Confirmed | Failed | Abandoned
//!   │
//!   └── PresentationState → View (what the operator sees)
//! ```
//!
//! # Features
//!
//! - `native` - CLI, logging, signal handling and the in-process dev wallet
//! - `wasm` - `window.ethereum` provider and the `LedgerApp` JS binding
//!
//! # Usage
//!
//! ```ignore
//! use ledgerlink::{Client, ClientConfig, DevWallet};
//!
//! let wallet = Arc::new(DevWallet::new(vec![account]));
//! let client = Client::new(wallet, ClientConfig::default());
//! client.initialize()?;
//! client.connect().await?;
//!
//! client.set_amount("1.5")?;
//! client.deposit().await?;
//! println!("{:?}", client.view()?.balance);
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod client;
pub mod config;
pub mod contract;
pub mod coordinator;
pub mod error;
pub mod presentation;
pub mod provider;
pub mod session;
pub mod units;

// =============================================================================
// Native-only modules (CLI, tokio)
// =============================================================================
#[cfg(feature = "native")]
pub mod devnet;
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod runtime;

// =============================================================================
// WASM-only modules (browser, wasm-bindgen)
// =============================================================================
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod wasm;

// =============================================================================
// Re-exports: Shared
// =============================================================================
pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use contract::{ContractBinding, ContractHandle, LEDGER_SCHEMA};
pub use coordinator::{OperationKind, OperationReport, OperationStatus, PendingOperation, TransactionCoordinator};
pub use error::{ErrorCategory, ProviderError, Result, WalletError};
pub use presentation::{PresentationState, View};
pub use provider::{AccountChange, ProviderGateway, TxReceipt, TxRequest, WalletProvider};
pub use session::{Session, SessionManager, SessionState, Transition};

// =============================================================================
// Re-exports: Native
// =============================================================================
#[cfg(feature = "native")]
pub use devnet::{DevLedger, DevWallet};
#[cfg(feature = "native")]
pub use runtime::{install_signal_handlers, Shutdown};

// =============================================================================
// Re-exports: WASM
// =============================================================================
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use wasm::LedgerApp;
