//! ProviderGateway - presence detection, account access, account-change feed

use super::WalletProvider;
use crate::error::{Result, WalletError};
use alloy_primitives::Address;
use futures::channel::mpsc;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletAvailability {
    Present,
    Absent,
}

/// One entry of the account-change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountChange {
    /// Non-empty account set; the first entry is the active identity.
    Active(Vec<Address>),
    /// The wallet exposes no account any more. Never dropped or merged, so
    /// the session cannot keep running under a stale identity.
    NoAccount,
}

impl AccountChange {
    pub fn from_accounts(accounts: Vec<Address>) -> Self {
        if accounts.is_empty() { Self::NoAccount } else { Self::Active(accounts) }
    }
}

/// Ordered receiver of [`AccountChange`]s.
pub struct AccountChanges {
    rx: mpsc::UnboundedReceiver<Vec<Address>>,
}

impl AccountChanges {
    /// Wait for the next change. `None` once the provider hangs up.
    pub async fn next(&mut self) -> Option<AccountChange> {
        self.rx.next().await.map(AccountChange::from_accounts)
    }

    /// Next change if one is already queued.
    pub fn try_next(&mut self) -> Option<AccountChange> {
        self.rx.next().now_or_never().flatten().map(AccountChange::from_accounts)
    }
}

pub struct ProviderGateway<P> {
    provider: Arc<P>,
}

impl<P> Clone for ProviderGateway<P> {
    fn clone(&self) -> Self { Self { provider: self.provider.clone() } }
}

impl<P: WalletProvider> ProviderGateway<P> {
    pub fn new(provider: Arc<P>) -> Self { Self { provider } }

    pub fn detect(&self) -> WalletAvailability {
        if self.provider.is_present() { WalletAvailability::Present } else { WalletAvailability::Absent }
    }

    /// Prompt for account access. Declines keep the wallet's own message;
    /// an empty grant is reported as [`WalletError::NoAccounts`].
    pub async fn request_accounts(&self) -> Result<Vec<Address>> {
        if self.detect() == WalletAvailability::Absent {
            return Err(WalletError::ProviderNotFound);
        }
        let accounts = self.provider.request_accounts().await?;
        if accounts.is_empty() {
            return Err(WalletError::NoAccounts);
        }
        Ok(accounts)
    }

    pub fn subscribe_account_change(&self) -> AccountChanges {
        AccountChanges { rx: self.provider.subscribe_accounts() }
    }
}
