//! Client - wires gateway, session, binding, coordinator and view together.
//!
//! The one object a host drives. Every public operation catches its own
//! errors at the boundary, writes them to the single error banner, and still
//! returns them so the caller can react.

use crate::config::ClientConfig;
use crate::contract::{ContractBinding, ContractHandle};
use crate::coordinator::{Intent, OperationKind, PendingOperation, TransactionCoordinator};
use crate::error::{Result, WalletError};
use crate::presentation::{PresentationState, View};
use crate::provider::{AccountChange, AccountChanges, ProviderGateway, WalletProvider};
use crate::session::{Session, SessionEvent, SessionManager, Transition};
use alloy_primitives::{Address, U256};
use std::sync::{Arc, Mutex, RwLock};

pub struct Client<P> {
    config: ClientConfig,
    sessions: SessionManager<P>,
    binding: ContractBinding<P>,
    handle: RwLock<Option<ContractHandle<P>>>,
    coordinator: TransactionCoordinator,
    view: Mutex<PresentationState>,
    changes: Mutex<Option<AccountChanges>>,
}

impl<P: WalletProvider> Client<P> {
    pub fn new(provider: Arc<P>, config: ClientConfig) -> Self {
        let gateway = ProviderGateway::new(provider.clone());
        Self {
            sessions: SessionManager::new(gateway),
            binding: ContractBinding::new(config.contract, provider),
            handle: RwLock::new(None),
            coordinator: TransactionCoordinator::new(config.decimals),
            view: Mutex::new(PresentationState::new(config.decimals)),
            changes: Mutex::new(None),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig { &self.config }
    pub fn coordinator(&self) -> &TransactionCoordinator { &self.coordinator }
    pub fn session(&self) -> Result<Session> { self.sessions.snapshot() }

    pub fn handle(&self) -> Result<Option<ContractHandle<P>>> {
        Ok(self.handle.read().map_err(|_| WalletError::Lock)?.clone())
    }

    pub fn view(&self) -> Result<View> { self.with_view(|view| view.view()) }

    /// Detect the wallet once and start listening for account changes.
    pub fn initialize(&self) -> Result<()> {
        let detected = self.sessions.initialize();
        self.reconcile()?;
        match detected {
            Ok(_) => {
                let mut changes = self.changes.lock().map_err(|_| WalletError::Lock)?;
                if changes.is_none() {
                    *changes = Some(self.sessions.gateway().subscribe_account_change());
                }
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Ask the wallet for account access, bind the contract to the granted
    /// account and load its balance.
    pub async fn connect(&self) -> Result<Address> {
        let connected = self.sessions.connect().await;
        self.reconcile()?;
        let account = connected.map_err(|err| self.report(err))?;
        self.with_view(|view| view.clear_error())?;
        if let Err(err) = self.refresh_balance().await {
            tracing::warn!(%account, "initial balance query failed: {}", err);
        }
        Ok(account)
    }

    /// Apply one account-change notification to the session.
    pub fn apply_account_change(&self, change: AccountChange) -> Result<Transition> {
        let emptied = change == AccountChange::NoAccount;
        let transition = self.sessions.apply(SessionEvent::AccountsChanged(change))?;
        self.reconcile()?;
        if emptied && transition == Transition::Dropped {
            if let Some(op) = self.coordinator.current() {
                tracing::warn!(id = op.id, kind = %op.kind, status = ?op.status, "session dropped with an operation in flight");
            }
            self.report(WalletError::NoAccounts);
        }
        Ok(transition)
    }

    /// Apply every account change already queued, in order, then reload the
    /// balance if the identity changed. Returns how many were applied.
    pub async fn process_account_changes(&self) -> Result<usize> {
        let mut applied = 0;
        let mut rebound = false;
        loop {
            let next = {
                let mut changes = self.changes.lock().map_err(|_| WalletError::Lock)?;
                changes.as_mut().and_then(|changes| changes.try_next())
            };
            let Some(change) = next else { break };
            rebound |= self.apply_account_change(change)?.requires_rebind();
            applied += 1;
        }
        if rebound {
            if let Err(err) = self.refresh_balance().await {
                tracing::warn!("balance query after account change failed: {}", err);
            }
        }
        Ok(applied)
    }

    /// Follow the account feed until the provider hangs up, calling
    /// `on_change` after each change is applied. Takes the feed over from
    /// [`process_account_changes`](Self::process_account_changes).
    pub async fn watch_accounts(&self, mut on_change: impl FnMut(Transition)) -> Result<()> {
        let taken = self.changes.lock().map_err(|_| WalletError::Lock)?.take();
        let Some(mut changes) = taken else { return Ok(()) };
        while let Some(change) = changes.next().await {
            let transition = self.apply_account_change(change)?;
            if transition.requires_rebind() {
                if let Err(err) = self.refresh_balance().await {
                    tracing::warn!("balance query after account change failed: {}", err);
                }
            }
            on_change(transition);
        }
        Ok(())
    }

    /// Query the ledger for the active account's balance. On failure the
    /// last known balance stays on display.
    pub async fn refresh_balance(&self) -> Result<U256> {
        let session = self.sessions.snapshot()?;
        let owner = session.signer().ok_or(WalletError::NotConnected)?;
        let handle = self.handle()?.ok_or(WalletError::NotConnected)?;
        let balance = self.binding.query(&session, &handle, owner).await?;
        // identity may have moved on while the query was out
        if self.is_current(&handle).is_ok() {
            self.with_view(|view| view.set_balance(balance))?;
        }
        tracing::debug!(%owner, %balance, "balance refreshed");
        Ok(balance)
    }

    pub async fn deposit(&self) -> Result<PendingOperation> { self.execute(OperationKind::Deposit).await }
    pub async fn withdraw(&self) -> Result<PendingOperation> { self.execute(OperationKind::Withdraw).await }
    pub async fn transfer(&self) -> Result<PendingOperation> { self.execute(OperationKind::Transfer).await }

    /// Run one operation with the current inputs.
    pub async fn execute(&self, kind: OperationKind) -> Result<PendingOperation> {
        let (amount, recipient) = self.with_view(|view| (view.amount().to_string(), view.recipient().to_string()))?;
        let handle = self.handle()?;
        let intent = Intent { amount: &amount, recipient: &recipient };

        match self.coordinator.run(kind, intent, handle, |handle| self.is_current(handle)).await {
            Ok(op) => {
                self.with_view(|view| {
                    view.clear_inputs(kind);
                    view.clear_error();
                })?;
                if let Err(err) = self.refresh_balance().await {
                    tracing::warn!(%kind, "balance query after confirmation failed: {}", err);
                }
                Ok(op)
            }
            // a drop has already put NoAccounts on the banner; a switch has not
            Err(err @ WalletError::Abandoned(_)) => {
                if self.sessions.snapshot()?.is_connected() {
                    Err(self.report(err))
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(self.report(err)),
        }
    }

    pub fn set_amount(&self, amount: impl Into<String>) -> Result<()> {
        self.with_view(|view| view.set_amount(amount))
    }

    pub fn set_recipient(&self, recipient: impl Into<String>) -> Result<()> {
        self.with_view(|view| view.set_recipient(recipient))
    }

    pub fn toggle_address(&self) -> Result<bool> { self.with_view(|view| view.toggle_address()) }

    fn is_current(&self, handle: &ContractHandle<P>) -> Result<()> {
        let session = self.sessions.snapshot()?;
        self.binding.ensure_current(&session, handle)
    }

    /// Make the handle and the view match the session: rebuild the handle
    /// when the identity moved, drop it when the session is gone.
    fn reconcile(&self) -> Result<Session> {
        let session = self.sessions.snapshot()?;
        {
            let mut handle = self.handle.write().map_err(|_| WalletError::Lock)?;
            let wanted = session.is_connected().then_some(session.epoch);
            if handle.as_ref().map(|h| h.epoch()) != wanted {
                *handle = if session.is_connected() { Some(self.binding.bind(&session)?) } else { None };
                match handle.as_ref() {
                    Some(h) => tracing::info!(contract = %self.binding.address(), signer = %h.signer(), epoch = h.epoch(), "contract handle bound"),
                    None => tracing::debug!(epoch = session.epoch, "contract handle released"),
                }
            }
        }
        self.with_view(|view| view.sync_session(&session))?;
        Ok(session)
    }

    fn report(&self, err: WalletError) -> WalletError {
        tracing::warn!(category = ?err.category(), "{}", err);
        if let Err(lock) = self.with_view(|view| view.report_error(&err)) {
            tracing::warn!("error banner not updated: {}", lock);
        }
        err
    }

    fn with_view<R>(&self, f: impl FnOnce(&mut PresentationState) -> R) -> Result<R> {
        let mut view = self.view.lock().map_err(|_| WalletError::Lock)?;
        Ok(f(&mut view))
    }
}
