//! PresentationState - what the operator sees. Derived, never authoritative.

use crate::coordinator::OperationKind;
use crate::error::WalletError;
use crate::session::{Session, SessionState};
use crate::units::format_amount;
use alloy_primitives::{Address, U256};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct PresentationState {
    decimals: u8,
    state: SessionState,
    account: Option<Address>,
    show_address: bool,
    balance: Option<U256>,
    amount: String,
    recipient: String,
    error: Option<String>,
}

/// Serializable snapshot handed to hosts (CLI output, JS binding).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub session: SessionState,
    pub connected: bool,
    pub owner_address: Option<String>,
    pub balance: Option<String>,
    pub amount: String,
    pub recipient: String,
    pub error: Option<String>,
}

impl PresentationState {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals,
            state: SessionState::Disconnected,
            account: None,
            show_address: true,
            balance: None,
            amount: String::new(),
            recipient: String::new(),
            error: None,
        }
    }

    /// Follow the session. A different identity invalidates the balance,
    /// which belonged to the previous account.
    pub fn sync_session(&mut self, session: &Session) {
        let account = session.signer();
        if account != self.account {
            self.balance = None;
        }
        self.account = account;
        self.state = session.state;
    }

    pub fn toggle_address(&mut self) -> bool {
        self.show_address = !self.show_address;
        self.show_address
    }

    pub fn set_amount(&mut self, amount: impl Into<String>) { self.amount = amount.into(); }
    pub fn set_recipient(&mut self, recipient: impl Into<String>) { self.recipient = recipient.into(); }
    pub fn amount(&self) -> &str { &self.amount }
    pub fn recipient(&self) -> &str { &self.recipient }

    pub fn set_balance(&mut self, balance: U256) { self.balance = Some(balance); }
    pub fn balance(&self) -> Option<U256> { self.balance }

    /// Replace whatever the banner showed before.
    pub fn report_error(&mut self, err: &WalletError) { self.error = Some(err.to_string()); }
    pub fn clear_error(&mut self) { self.error = None; }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }

    /// Clear the inputs a confirmed operation consumed.
    pub fn clear_inputs(&mut self, kind: OperationKind) {
        self.amount.clear();
        if kind.needs_recipient() {
            self.recipient.clear();
        }
    }

    pub fn view(&self) -> View {
        let connected = self.state == SessionState::Connected;
        View {
            session: self.state,
            connected,
            owner_address: self
                .account
                .filter(|_| connected && self.show_address)
                .map(|account| account.to_checksum(None)),
            balance: self.balance.map(|balance| format_amount(balance, self.decimals)),
            amount: self.amount.clone(),
            recipient: self.recipient.clone(),
            error: self.error.clone(),
        }
    }
}
