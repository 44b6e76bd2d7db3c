//! TransactionCoordinator - one mutating ledger operation at a time.
//!
//! Every deposit, withdrawal and transfer goes through the same three phases:
//!
//! ```text
//! Validating ──(local checks)──▶ Submitted ──(receipt)──▶ Confirmed
//!     │                              │
//!     └─▶ rejected locally           ├─▶ Failed     (declined, reverted, RPC)
//!         (never leaves Validating)  └─▶ Abandoned  (session dropped, outcome unknown)
//! ```
//!
//! The coordinator tracks a single in-flight operation. A request that
//! arrives while another one is in flight is rejected with
//! [`WalletError::Busy`] rather than queued, so two mutating calls never
//! race on the same signer.

use crate::contract::ContractHandle;
use crate::error::{Result, WalletError};
use crate::provider::WalletProvider;
use crate::units::{parse_address, parse_amount};
use alloy_primitives::{Address, TxHash, U256};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deposit,
    Withdraw,
    Transfer,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "deposit",
            OperationKind::Withdraw => "withdrawal",
            OperationKind::Transfer => "transfer",
        }
    }

    pub fn needs_recipient(&self) -> bool { matches!(self, OperationKind::Transfer) }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Validating,
    Submitted,
    Confirmed,
    Failed,
    Abandoned,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Confirmed | OperationStatus::Failed | OperationStatus::Abandoned)
    }
}

/// Raw operator input for one operation.
#[derive(Debug, Clone, Copy)]
pub struct Intent<'a> {
    pub amount: &'a str,
    pub recipient: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOperation {
    pub id: u64,
    pub kind: OperationKind,
    /// Base units; zero until validation succeeds.
    pub amount: U256,
    pub recipient: Option<Address>,
    pub signer: Option<Address>,
    pub status: OperationStatus,
    pub tx_hash: Option<TxHash>,
}

/// Terminal snapshot of an operation, kept after the operation itself is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationReport {
    #[serde(flatten)]
    pub operation: PendingOperation,
    pub error: Option<String>,
}

/// An operation that passed local validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validated {
    pub kind: OperationKind,
    pub amount: U256,
    pub recipient: Option<Address>,
}

/// Pure local validation: no provider is consulted.
pub fn validate<P>(kind: OperationKind, intent: Intent<'_>, handle: Option<&ContractHandle<P>>, decimals: u8) -> Result<Validated> {
    if handle.is_none() {
        return Err(WalletError::NotConnected);
    }
    let amount = parse_amount(intent.amount, decimals)?;
    let recipient = if kind.needs_recipient() { Some(parse_address(intent.recipient)?) } else { None };
    Ok(Validated { kind, amount, recipient })
}

pub struct TransactionCoordinator {
    decimals: u8,
    next_id: AtomicU64,
    in_flight: Mutex<Option<PendingOperation>>,
    last: Mutex<Option<OperationReport>>,
}

impl TransactionCoordinator {
    pub fn new(decimals: u8) -> Self {
        Self { decimals, next_id: AtomicU64::new(1), in_flight: Mutex::new(None), last: Mutex::new(None) }
    }

    /// The operation currently in flight, if any.
    pub fn current(&self) -> Option<PendingOperation> {
        self.in_flight.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn last_report(&self) -> Option<OperationReport> {
        self.last.lock().ok().and_then(|last| last.clone())
    }

    /// Drive one operation through validate → submit → confirm.
    ///
    /// `still_current` is asked before submitting and again after the
    /// provider answers; if the session moved on in between, the operation is
    /// abandoned and its outcome is not reported as Confirmed.
    pub async fn run<P, F>(
        &self,
        kind: OperationKind,
        intent: Intent<'_>,
        handle: Option<ContractHandle<P>>,
        still_current: F,
    ) -> Result<PendingOperation>
    where
        P: WalletProvider,
        F: Fn(&ContractHandle<P>) -> Result<()>,
    {
        let slot = self.claim(kind)?;

        let validated = match validate(kind, intent, handle.as_ref(), self.decimals) {
            Ok(validated) => validated,
            Err(err) => return Err(self.finish(slot, OperationStatus::Validating, err)),
        };
        let handle = match handle {
            Some(handle) => handle,
            None => return Err(self.finish(slot, OperationStatus::Validating, WalletError::NotConnected)),
        };
        if let Err(err) = still_current(&handle) {
            return Err(self.finish(slot, OperationStatus::Validating, err));
        }
        self.update(&slot, |op| {
            op.amount = validated.amount;
            op.recipient = validated.recipient;
            op.signer = Some(handle.signer());
        });
        tracing::debug!(id = slot.id, %kind, amount = %validated.amount, "operation validated");

        let submitted = match kind {
            OperationKind::Deposit => handle.deposit(validated.amount).await,
            OperationKind::Withdraw => handle.withdraw(validated.amount).await,
            OperationKind::Transfer => match validated.recipient {
                Some(recipient) => handle.transfer_token(recipient, validated.amount).await,
                None => Err(WalletError::InvalidRecipient),
            },
        };
        let hash = match submitted {
            Ok(hash) => hash,
            Err(err) => return Err(self.fail_or_abandon(slot, &handle, &still_current, err)),
        };
        self.update(&slot, |op| {
            op.status = OperationStatus::Submitted;
            op.tx_hash = Some(hash);
        });
        tracing::info!(id = slot.id, %kind, tx = %hash, "operation submitted");

        if let Err(err) = handle.confirm(hash).await {
            return Err(self.fail_or_abandon(slot, &handle, &still_current, err));
        }
        if still_current(&handle).is_err() {
            return Err(self.finish(slot, OperationStatus::Abandoned, WalletError::Abandoned(kind)));
        }

        let confirmed = self.snapshot(&slot, OperationStatus::Confirmed);
        self.record(confirmed.clone(), None);
        tracing::info!(id = slot.id, %kind, tx = %hash, "operation confirmed");
        Ok(confirmed)
    }

    fn claim(&self, kind: OperationKind) -> Result<Slot<'_>> {
        let mut in_flight = self.in_flight.lock().map_err(|_| WalletError::Lock)?;
        if let Some(busy) = in_flight.as_ref() {
            tracing::warn!(busy = %busy.kind, requested = %kind, "operation rejected: another one is in flight");
            return Err(WalletError::Busy(busy.kind));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *in_flight = Some(PendingOperation {
            id,
            kind,
            amount: U256::ZERO,
            recipient: None,
            signer: None,
            status: OperationStatus::Validating,
            tx_hash: None,
        });
        Ok(Slot { coordinator: self, id, kind })
    }

    fn update(&self, slot: &Slot<'_>, f: impl FnOnce(&mut PendingOperation)) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if let Some(op) = in_flight.as_mut().filter(|op| op.id == slot.id) {
                f(op);
            }
        }
    }

    fn snapshot(&self, slot: &Slot<'_>, status: OperationStatus) -> PendingOperation {
        self.update(slot, |op| op.status = status);
        self.current().filter(|op| op.id == slot.id).unwrap_or(PendingOperation {
            id: slot.id,
            kind: slot.kind,
            amount: U256::ZERO,
            recipient: None,
            signer: None,
            status,
            tx_hash: None,
        })
    }

    fn fail_or_abandon<P, F>(&self, slot: Slot<'_>, handle: &ContractHandle<P>, still_current: &F, err: WalletError) -> WalletError
    where
        F: Fn(&ContractHandle<P>) -> Result<()>,
    {
        if still_current(handle).is_err() {
            let kind = slot.kind;
            return self.finish(slot, OperationStatus::Abandoned, WalletError::Abandoned(kind));
        }
        self.finish(slot, OperationStatus::Failed, err)
    }

    fn finish(&self, slot: Slot<'_>, status: OperationStatus, err: WalletError) -> WalletError {
        let op = self.snapshot(&slot, status);
        tracing::warn!(id = op.id, kind = %op.kind, status = ?status, "operation ended: {}", err);
        self.record(op, Some(err.to_string()));
        drop(slot);
        err
    }

    fn record(&self, operation: PendingOperation, error: Option<String>) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(OperationReport { operation, error });
        }
    }
}

/// Occupancy of the in-flight slot; released on drop, whatever the outcome.
struct Slot<'a> {
    coordinator: &'a TransactionCoordinator,
    id: u64,
    kind: OperationKind,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.coordinator.in_flight.lock() {
            if in_flight.as_ref().map(|op| op.id) == Some(self.id) {
                *in_flight = None;
            }
        }
    }
}
