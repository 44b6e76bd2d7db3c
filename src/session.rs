//! Session - wallet connection lifecycle and the active identity.
//!
//! ```text
//! Disconnected ──(wallet detected)──▶ ReadyToConnect ──(connect)──▶ Connecting
//!      ▲                                    ▲                          │
//!      │                                    └──(declined / no account)─┤
//!      │                                                               ▼
//!      └────────────(account set empties)──────────────────────── Connected
//!                                                          (switch: new epoch)
//! ```
//!
//! Every change goes through [`SessionManager::apply`], one event at a time,
//! under a single lock. `epoch` moves whenever the identity behind the
//! session changes, which is how contract handles detect that they are stale.

use crate::error::{Result, WalletError};
use crate::provider::{AccountChange, ProviderGateway, WalletAvailability, WalletProvider};
use alloy_primitives::Address;
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    ReadyToConnect,
    Connecting,
    Connected,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::ReadyToConnect => "ready to connect",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub wallet_present: bool,
    pub active_account: Option<Address>,
    pub state: SessionState,
    pub epoch: u64,
}

impl Session {
    pub fn is_connected(&self) -> bool { self.state == SessionState::Connected }

    /// Active account, only while Connected.
    pub fn signer(&self) -> Option<Address> {
        if self.is_connected() { self.active_account } else { None }
    }
}

/// Inputs to the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    WalletDetected,
    WalletMissing,
    ConnectRequested,
    AccountsGranted(Vec<Address>),
    ConnectFailed,
    AccountsChanged(AccountChange),
}

/// What an applied event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Ready,
    Connecting,
    /// Entered Connected with this account.
    Connected(Address),
    /// Still Connected, now under this account.
    Switched(Address),
    /// Connect attempt ended without an account.
    ConnectAborted,
    /// Account set emptied; identity gone.
    Dropped,
}

impl Transition {
    /// The identity changed and any contract handle must be rebuilt.
    pub fn requires_rebind(&self) -> bool {
        matches!(self, Transition::Connected(_) | Transition::Switched(_))
    }
}

pub struct SessionManager<P> {
    gateway: ProviderGateway<P>,
    session: Mutex<Session>,
}

impl<P: WalletProvider> SessionManager<P> {
    pub fn new(gateway: ProviderGateway<P>) -> Self {
        Self { gateway, session: Mutex::new(Session::default()) }
    }

    pub fn gateway(&self) -> &ProviderGateway<P> { &self.gateway }

    pub fn snapshot(&self) -> Result<Session> {
        Ok(self.session.lock().map_err(|_| WalletError::Lock)?.clone())
    }

    /// Run detection once. A missing wallet is terminal and is not retried.
    pub fn initialize(&self) -> Result<Transition> {
        match self.gateway.detect() {
            WalletAvailability::Present => self.apply(SessionEvent::WalletDetected),
            WalletAvailability::Absent => {
                self.apply(SessionEvent::WalletMissing)?;
                Err(WalletError::ProviderNotFound)
            }
        }
    }

    /// Request account access and, on success, enter Connected.
    pub async fn connect(&self) -> Result<Address> {
        self.apply(SessionEvent::ConnectRequested)?;
        let accounts = match self.gateway.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                self.apply(SessionEvent::ConnectFailed)?;
                return Err(err);
            }
        };
        match self.apply(SessionEvent::AccountsGranted(accounts))? {
            Transition::Connected(account) => Ok(account),
            // access was revoked while the prompt was open
            _ => Err(WalletError::NoAccounts),
        }
    }

    /// The single state-transition entry point.
    pub fn apply(&self, event: SessionEvent) -> Result<Transition> {
        let mut session = self.session.lock().map_err(|_| WalletError::Lock)?;
        let transition = step(&mut session, event)?;
        if transition != Transition::Unchanged {
            tracing::info!(
                state = session.state.as_str(),
                account = ?session.active_account,
                epoch = session.epoch,
                "session {:?}",
                transition
            );
        }
        Ok(transition)
    }
}

fn step(session: &mut Session, event: SessionEvent) -> Result<Transition> {
    use SessionState::*;

    Ok(match (session.state, event) {
        (_, SessionEvent::WalletDetected) => {
            session.wallet_present = true;
            if session.state == Disconnected {
                session.state = ReadyToConnect;
                Transition::Ready
            } else {
                Transition::Unchanged
            }
        }
        (_, SessionEvent::WalletMissing) => {
            *session = Session { epoch: session.epoch + 1, ..Session::default() };
            Transition::Dropped
        }

        (ReadyToConnect, SessionEvent::ConnectRequested) => {
            session.state = Connecting;
            Transition::Connecting
        }
        (Disconnected, SessionEvent::ConnectRequested) if session.wallet_present => {
            session.state = Connecting;
            Transition::Connecting
        }
        (Disconnected, SessionEvent::ConnectRequested) => return Err(WalletError::ProviderNotFound),
        (state, SessionEvent::ConnectRequested) => {
            return Err(WalletError::InvalidState { action: "connect", state: state.as_str() })
        }

        (Connecting, SessionEvent::AccountsGranted(accounts)) => match accounts.first() {
            Some(&account) => {
                session.active_account = Some(account);
                session.state = Connected;
                session.epoch += 1;
                Transition::Connected(account)
            }
            None => {
                session.state = ReadyToConnect;
                Transition::ConnectAborted
            }
        },
        (_, SessionEvent::AccountsGranted(_)) => Transition::Unchanged,

        (Connecting, SessionEvent::ConnectFailed) => {
            session.state = ReadyToConnect;
            Transition::ConnectAborted
        }
        (_, SessionEvent::ConnectFailed) => Transition::Unchanged,

        (Connected, SessionEvent::AccountsChanged(AccountChange::Active(accounts))) => {
            match accounts.first() {
                Some(&account) if session.active_account != Some(account) => {
                    session.active_account = Some(account);
                    session.epoch += 1;
                    Transition::Switched(account)
                }
                _ => Transition::Unchanged,
            }
        }
        (Connected | Connecting, SessionEvent::AccountsChanged(AccountChange::NoAccount)) => {
            session.active_account = None;
            session.state = Disconnected;
            session.epoch += 1;
            Transition::Dropped
        }
        // Outside a session the feed carries nothing to act on; a new
        // session starts with an explicit connect.
        (_, SessionEvent::AccountsChanged(_)) => Transition::Unchanged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address { Address::repeat_byte(byte) }

    fn connected(account: Address) -> Session {
        let mut session = Session::default();
        step(&mut session, SessionEvent::WalletDetected).unwrap();
        step(&mut session, SessionEvent::ConnectRequested).unwrap();
        step(&mut session, SessionEvent::AccountsGranted(vec![account])).unwrap();
        session
    }

    #[test]
    fn happy_path_reaches_connected() {
        let mut session = Session::default();
        assert_eq!(step(&mut session, SessionEvent::WalletDetected).unwrap(), Transition::Ready);
        assert_eq!(step(&mut session, SessionEvent::ConnectRequested).unwrap(), Transition::Connecting);
        assert_eq!(
            step(&mut session, SessionEvent::AccountsGranted(vec![addr(1), addr(2)])).unwrap(),
            Transition::Connected(addr(1))
        );
        assert_eq!(session.signer(), Some(addr(1)));
        assert_eq!(session.epoch, 1);
    }

    #[test]
    fn connect_without_wallet_is_refused() {
        let mut session = Session::default();
        step(&mut session, SessionEvent::WalletMissing).unwrap();
        assert_eq!(step(&mut session, SessionEvent::ConnectRequested), Err(WalletError::ProviderNotFound));
        assert_eq!(session.state, SessionState::Disconnected);
    }

    #[test]
    fn connect_twice_is_refused() {
        let mut session = connected(addr(1));
        assert!(matches!(
            step(&mut session, SessionEvent::ConnectRequested),
            Err(WalletError::InvalidState { action: "connect", .. })
        ));
    }

    #[test]
    fn declined_connect_returns_to_ready() {
        let mut session = Session::default();
        step(&mut session, SessionEvent::WalletDetected).unwrap();
        step(&mut session, SessionEvent::ConnectRequested).unwrap();
        assert_eq!(step(&mut session, SessionEvent::ConnectFailed).unwrap(), Transition::ConnectAborted);
        assert_eq!(session.state, SessionState::ReadyToConnect);
        assert_eq!(session.active_account, None);
    }

    #[test]
    fn switch_keeps_connected_and_bumps_epoch() {
        let mut session = connected(addr(1));
        let t = step(&mut session, SessionEvent::AccountsChanged(AccountChange::Active(vec![addr(2)]))).unwrap();
        assert_eq!(t, Transition::Switched(addr(2)));
        assert!(t.requires_rebind());
        assert_eq!(session.state, SessionState::Connected);
        assert_eq!(session.epoch, 2);

        // same account again is not a change
        let t = step(&mut session, SessionEvent::AccountsChanged(AccountChange::Active(vec![addr(2)]))).unwrap();
        assert_eq!(t, Transition::Unchanged);
        assert_eq!(session.epoch, 2);
    }

    #[test]
    fn empty_account_set_drops_session() {
        let mut session = connected(addr(1));
        let t = step(&mut session, SessionEvent::AccountsChanged(AccountChange::NoAccount)).unwrap();
        assert_eq!(t, Transition::Dropped);
        assert_eq!(session.state, SessionState::Disconnected);
        assert_eq!(session.signer(), None);
        assert!(session.wallet_present);

        // reconnect is allowed from Disconnected with a wallet present
        assert_eq!(step(&mut session, SessionEvent::ConnectRequested).unwrap(), Transition::Connecting);
    }

    #[test]
    fn revocation_during_connect_wins_over_late_grant() {
        let mut session = Session::default();
        step(&mut session, SessionEvent::WalletDetected).unwrap();
        step(&mut session, SessionEvent::ConnectRequested).unwrap();
        step(&mut session, SessionEvent::AccountsChanged(AccountChange::NoAccount)).unwrap();
        let t = step(&mut session, SessionEvent::AccountsGranted(vec![addr(1)])).unwrap();
        assert_eq!(t, Transition::Unchanged);
        assert_eq!(session.state, SessionState::Disconnected);
    }

    #[test]
    fn account_feed_is_ignored_outside_a_session() {
        let mut session = Session::default();
        step(&mut session, SessionEvent::WalletDetected).unwrap();
        let t = step(&mut session, SessionEvent::AccountsChanged(AccountChange::Active(vec![addr(3)]))).unwrap();
        assert_eq!(t, Transition::Unchanged);
        assert_eq!(session.active_account, None);
    }
}
