//! Devnet - in-process wallet and ledger contract.
//!
//! [`DevWallet`] behaves like a browser wallet in front of a node running the
//! ledger contract: it grants accounts, emits account changes, signs (or
//! declines to sign) and mines transactions into a [`DevLedger`]. The CLI's
//! `demo`/`repl` commands and the integration tests run against it.

use crate::contract::ILedger;
use crate::error::{ProviderError, UNAUTHORIZED};
use crate::provider::{TxReceipt, TxRequest, WalletProvider};
use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy_sol_types::SolInterface;
use async_trait::async_trait;
use futures::channel::mpsc;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;

/// JSON-RPC code nodes use for reverted execution.
const EXECUTION_REVERTED: i64 = 3;

/// Balances keyed by account, mutated only by executing contract calls.
#[derive(Debug, Default, Clone)]
pub struct DevLedger {
    balances: HashMap<Address, U256>,
}

impl DevLedger {
    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn credit(&mut self, account: Address, amount: U256) {
        *self.balances.entry(account).or_default() += amount;
    }

    /// `eth_call`: read-only entry points only.
    pub fn view(&self, data: &[u8]) -> Result<Bytes, String> {
        match ILedger::ILedgerCalls::abi_decode(data, true).map_err(|e| e.to_string())? {
            ILedger::ILedgerCalls::getBalance(call) => {
                Ok(Bytes::from(self.balance_of(call.account).to_be_bytes::<32>().to_vec()))
            }
            _ => Err("call to a state-changing function".into()),
        }
    }

    /// Execute a state-changing call from `from` carrying `value`. An error
    /// is the revert reason; the ledger is left untouched.
    pub fn execute(&mut self, from: Address, value: U256, data: &[u8]) -> Result<(), String> {
        let call = ILedger::ILedgerCalls::abi_decode(data, true).map_err(|e| e.to_string())?;
        if !value.is_zero() && !matches!(call, ILedger::ILedgerCalls::deposit(_)) {
            return Err("function is not payable".into());
        }
        match call {
            ILedger::ILedgerCalls::getBalance(_) => Ok(()),
            ILedger::ILedgerCalls::deposit(_) => {
                self.credit(from, value);
                Ok(())
            }
            ILedger::ILedgerCalls::withdraw(call) => self.debit(from, call.amount),
            ILedger::ILedgerCalls::transferToken(call) => {
                self.debit(from, call.amount)?;
                self.credit(call.recipient, call.amount);
                Ok(())
            }
        }
    }

    fn debit(&mut self, account: Address, amount: U256) -> Result<(), String> {
        let balance = self.balance_of(account);
        if balance < amount {
            return Err("Insufficient balance".into());
        }
        self.balances.insert(account, balance - amount);
        Ok(())
    }
}

#[derive(Default)]
struct DevState {
    accounts: Vec<Address>,
    authorized: bool,
    listeners: Vec<mpsc::UnboundedSender<Vec<Address>>>,
    ledger: DevLedger,
    nonce: u64,
    block: u64,
    receipts: HashMap<TxHash, TxReceipt>,
    sent: Vec<TxRequest>,
    eth_calls: usize,
    reject_access: Option<String>,
    reject_signature: Option<String>,
    preflight: bool,
}

pub struct DevWallet {
    present: bool,
    state: Mutex<DevState>,
    /// `true` while confirmations are held back.
    gate: watch::Sender<bool>,
}

impl DevWallet {
    pub fn new(accounts: Vec<Address>) -> Self {
        Self {
            present: true,
            state: Mutex::new(DevState { accounts, preflight: true, ..DevState::default() }),
            gate: watch::Sender::new(false),
        }
    }

    /// No wallet installed.
    pub fn absent() -> Self { Self { present: false, ..Self::new(Vec::new()) } }

    pub fn fund(&self, account: Address, amount: U256) { self.with_state(|s| s.ledger.credit(account, amount)) }
    pub fn balance_of(&self, account: Address) -> U256 { self.with_state(|s| s.ledger.balance_of(account)) }

    /// Decline the next account-access prompt with `message`.
    pub fn reject_next_access(&self, message: impl Into<String>) {
        let message = message.into();
        self.with_state(|s| s.reject_access = Some(message));
    }

    /// Decline the next signing prompt with `message`.
    pub fn reject_next_signature(&self, message: impl Into<String>) {
        let message = message.into();
        self.with_state(|s| s.reject_signature = Some(message));
    }

    /// With preflight on (the default) a call that would revert fails at
    /// submission, like a wallet's gas estimation. Off, it is mined and
    /// reverts in its receipt.
    pub fn set_preflight(&self, enabled: bool) { self.with_state(|s| s.preflight = enabled) }

    /// Replace the account set and notify subscribers, like the wallet's
    /// `accountsChanged` event. An empty set revokes access.
    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.with_state(|s| {
            s.accounts = accounts.clone();
            if accounts.is_empty() {
                s.authorized = false;
            }
            s.listeners.retain(|tx| tx.unbounded_send(accounts.clone()).is_ok());
        });
    }

    pub fn hold_confirmations(&self) { self.gate.send_replace(true); }
    pub fn release_confirmations(&self) { self.gate.send_replace(false); }

    pub fn sent_transactions(&self) -> Vec<TxRequest> { self.with_state(|s| s.sent.clone()) }
    pub fn eth_calls(&self) -> usize { self.with_state(|s| s.eth_calls) }

    fn with_state<R>(&self, f: impl FnOnce(&mut DevState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }
}

#[async_trait]
impl WalletProvider for DevWallet {
    fn is_present(&self) -> bool { self.present }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.with_state(|s| {
            if let Some(message) = s.reject_access.take() {
                return Err(ProviderError::rejected(message));
            }
            s.authorized = !s.accounts.is_empty();
            Ok(s.accounts.clone())
        })
    }

    fn subscribe_accounts(&self) -> mpsc::UnboundedReceiver<Vec<Address>> {
        let (tx, rx) = mpsc::unbounded();
        self.with_state(|s| s.listeners.push(tx));
        rx
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        self.with_state(|s| {
            s.eth_calls += 1;
            s.ledger.view(&data).map_err(|reason| ProviderError::Rpc {
                code: EXECUTION_REVERTED,
                message: format!("execution reverted: {reason}"),
            })
        })
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash, ProviderError> {
        self.with_state(|s| {
            if !s.authorized || !s.accounts.contains(&tx.from) {
                return Err(ProviderError::Rejected {
                    code: UNAUTHORIZED,
                    message: "The requested account and/or method has not been authorized by the user.".into(),
                });
            }
            if let Some(message) = s.reject_signature.take() {
                return Err(ProviderError::rejected(message));
            }

            // preflight against a scratch copy, as gas estimation would
            let mut scratch = s.ledger.clone();
            let outcome = scratch.execute(tx.from, tx.value, &tx.data);
            if let Err(reason) = &outcome {
                if s.preflight {
                    return Err(ProviderError::Rpc {
                        code: EXECUTION_REVERTED,
                        message: format!("execution reverted: {reason}"),
                    });
                }
            } else {
                s.ledger = scratch;
            }

            s.nonce += 1;
            s.block += 1;
            let mut preimage = tx.from.to_vec();
            preimage.extend_from_slice(&s.nonce.to_be_bytes());
            preimage.extend_from_slice(&tx.data);
            let hash = keccak256(&preimage);
            s.receipts.insert(hash, TxReceipt { hash, success: outcome.is_ok(), block_number: Some(s.block) });
            s.sent.push(tx);
            Ok(hash)
        })
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt, ProviderError> {
        let mut gate = self.gate.subscribe();
        gate.wait_for(|held| !*held)
            .await
            .map(|_| ())
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        self.with_state(|s| s.receipts.get(&hash).cloned())
            .ok_or_else(|| ProviderError::Rpc { code: -32000, message: format!("unknown transaction {hash}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolCall;

    #[test]
    fn ledger_executes_abi_calls() {
        let (alice, bob) = (Address::repeat_byte(0xa1), Address::repeat_byte(0xb0));
        let mut ledger = DevLedger::default();
        ledger.execute(alice, U256::from(10u64), &ILedger::depositCall {}.abi_encode()).unwrap();
        ledger
            .execute(alice, U256::ZERO, &ILedger::transferTokenCall { recipient: bob, amount: U256::from(4u64) }.abi_encode())
            .unwrap();
        assert_eq!(ledger.balance_of(alice), U256::from(6u64));
        assert_eq!(ledger.balance_of(bob), U256::from(4u64));

        let err = ledger.execute(bob, U256::ZERO, &ILedger::withdrawCall { amount: U256::from(5u64) }.abi_encode());
        assert_eq!(err, Err("Insufficient balance".to_string()));
        assert_eq!(ledger.balance_of(bob), U256::from(4u64));
    }

    #[test]
    fn withdraw_is_not_payable() {
        let mut ledger = DevLedger::default();
        let err = ledger.execute(Address::ZERO, U256::from(1u64), &ILedger::withdrawCall { amount: U256::ZERO }.abi_encode());
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn unauthorized_sender_is_refused() {
        let alice = Address::repeat_byte(0xa1);
        let wallet = DevWallet::new(vec![alice]);
        let tx = TxRequest::new(alice, Address::ZERO, ILedger::depositCall {}.abi_encode());
        assert!(matches!(wallet.send_transaction(tx).await, Err(ProviderError::Rejected { code: UNAUTHORIZED, .. })));
        assert!(wallet.sent_transactions().is_empty());
    }
}
