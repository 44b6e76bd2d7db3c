//! ContractBinding - the ledger contract bound to the active signer.
//!
//! A [`ContractHandle`] is an immutable value: fixed address, the interface
//! schema, the signer and the session epoch it was built for. It is rebuilt
//! on every identity change and never shared across accounts, so a mutating
//! call can never go out under a previous signer.

pub mod abi;

pub use abi::{EntryPoint, ILedger, LedgerSchema, LEDGER_SCHEMA};

use crate::error::{Result, WalletError};
use crate::provider::{TxReceipt, TxRequest, WalletProvider};
use crate::session::Session;
use alloy_primitives::{Address, TxHash, U256};
use alloy_sol_types::SolCall;
use std::sync::Arc;

pub struct ContractHandle<P> {
    address: Address,
    schema: &'static LedgerSchema,
    signer: Address,
    epoch: u64,
    provider: Arc<P>,
}

impl<P> Clone for ContractHandle<P> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            schema: self.schema,
            signer: self.signer,
            epoch: self.epoch,
            provider: self.provider.clone(),
        }
    }
}

impl<P> std::fmt::Debug for ContractHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHandle")
            .field("address", &self.address)
            .field("signer", &self.signer)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl<P: WalletProvider> ContractHandle<P> {
    pub fn address(&self) -> Address { self.address }
    pub fn signer(&self) -> Address { self.signer }
    pub fn epoch(&self) -> u64 { self.epoch }

    pub async fn get_balance(&self, owner: Address) -> Result<U256> {
        let data = ILedger::getBalanceCall { account: owner }.abi_encode();
        let raw = self.provider.call(self.address, data.into()).await?;
        let decoded = ILedger::getBalanceCall::abi_decode_returns(&raw, true)
            .map_err(|e| WalletError::Decode(e.to_string()))?;
        Ok(decoded.balance)
    }

    pub async fn deposit(&self, value: U256) -> Result<TxHash> {
        let data = ILedger::depositCall {}.abi_encode();
        self.submit(&self.schema.deposit, TxRequest::new(self.signer, self.address, data).with_value(value)).await
    }

    pub async fn withdraw(&self, amount: U256) -> Result<TxHash> {
        let data = ILedger::withdrawCall { amount }.abi_encode();
        self.submit(&self.schema.withdraw, TxRequest::new(self.signer, self.address, data)).await
    }

    pub async fn transfer_token(&self, recipient: Address, amount: U256) -> Result<TxHash> {
        let data = ILedger::transferTokenCall { recipient, amount }.abi_encode();
        self.submit(&self.schema.transfer_token, TxRequest::new(self.signer, self.address, data)).await
    }

    /// Wait for finality. A mined-but-reverted transaction is an error.
    pub async fn confirm(&self, hash: TxHash) -> Result<TxReceipt> {
        let receipt = self.provider.wait_for_receipt(hash).await?;
        if !receipt.success {
            return Err(WalletError::Reverted(hash));
        }
        Ok(receipt)
    }

    async fn submit(&self, entry: &EntryPoint, tx: TxRequest) -> Result<TxHash> {
        tracing::debug!(entry = entry.signature, signer = %self.signer, value = %tx.value, "sending transaction");
        Ok(self.provider.send_transaction(tx).await?)
    }
}

/// Fixed contract address + provider; produces handles for a session.
pub struct ContractBinding<P> {
    address: Address,
    provider: Arc<P>,
}

impl<P: WalletProvider> ContractBinding<P> {
    pub fn new(address: Address, provider: Arc<P>) -> Self { Self { address, provider } }

    pub fn address(&self) -> Address { self.address }

    pub fn bind(&self, session: &Session) -> Result<ContractHandle<P>> {
        let signer = session.signer().ok_or(WalletError::NotConnected)?;
        Ok(ContractHandle {
            address: self.address,
            schema: &LEDGER_SCHEMA,
            signer,
            epoch: session.epoch,
            provider: self.provider.clone(),
        })
    }

    /// Reject a handle that no longer matches the session, before anything
    /// is sent to the provider.
    pub fn ensure_current(&self, session: &Session, handle: &ContractHandle<P>) -> Result<()> {
        let signer = session.signer().ok_or(WalletError::NotConnected)?;
        if handle.epoch != session.epoch || handle.signer != signer {
            return Err(WalletError::StaleHandle);
        }
        Ok(())
    }

    pub async fn query(&self, session: &Session, handle: &ContractHandle<P>, owner: Address) -> Result<U256> {
        self.ensure_current(session, handle)?;
        handle.get_balance(owner).await
    }
}
