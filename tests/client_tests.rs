//! Client Tests: full operator flows against the in-process dev wallet
//!
//! These tests verify:
//! 1. Wallet detection and account access (granted, declined, absent)
//! 2. Deposits, withdrawals and transfers reach the ledger in base units
//! 3. Local validation never reaches the provider
//! 4. Account switches rebind the contract; an emptied account set drops it
//! 5. One operation in flight at a time; a session change abandons it

use alloy_primitives::{address, Address, U256};
use alloy_sol_types::SolCall;
use ledgerlink::contract::ILedger;
use ledgerlink::{
    Client, ClientConfig, ContractBinding, DevWallet, OperationKind, OperationStatus, SessionState, Transition,
    WalletError,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

static CONFIG: Lazy<ClientConfig> = Lazy::new(ClientConfig::default);

const ALICE: Address = address!("a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1");
const BOB: Address = address!("b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0");

/// 10^18 base units per display unit.
fn units(whole: u64, tenths: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
        + U256::from(tenths) * U256::from(10u64).pow(U256::from(17u64))
}

fn setup(accounts: Vec<Address>) -> (Arc<DevWallet>, Client<DevWallet>) {
    let wallet = Arc::new(DevWallet::new(accounts));
    let client = Client::new(wallet.clone(), CONFIG.clone());
    (wallet, client)
}

async fn connected(accounts: Vec<Address>) -> (Arc<DevWallet>, Client<DevWallet>) {
    let (wallet, client) = setup(accounts);
    client.initialize().expect("initialize");
    client.connect().await.expect("connect");
    (wallet, client)
}

async fn wait_until_submitted(client: &Client<DevWallet>) {
    while client.coordinator().current().map(|op| op.status) != Some(OperationStatus::Submitted) {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Session
// =============================================================================

/// Test: Connect binds the contract to the first granted account
#[tokio::test]
async fn connect_binds_first_account() {
    let (wallet, client) = setup(vec![ALICE, BOB]);
    wallet.fund(ALICE, units(3, 0));

    client.initialize().expect("initialize");
    assert_eq!(client.session().unwrap().state, SessionState::ReadyToConnect);

    let account = client.connect().await.expect("connect");
    assert_eq!(account, ALICE);

    let handle = client.handle().unwrap().expect("handle");
    assert_eq!(handle.signer(), ALICE);
    assert_eq!(handle.address(), CONFIG.contract);

    let view = client.view().unwrap();
    assert!(view.connected);
    assert_eq!(view.owner_address, Some(ALICE.to_checksum(None)));
    assert_eq!(view.balance.as_deref(), Some("3.0"));
    assert_eq!(view.error, None);
}

/// Test: No wallet installed is reported and connect stays impossible
#[tokio::test]
async fn absent_wallet_is_reported() {
    let wallet = Arc::new(DevWallet::absent());
    let client = Client::new(wallet.clone(), CONFIG.clone());

    assert_eq!(client.initialize(), Err(WalletError::ProviderNotFound));
    let view = client.view().unwrap();
    assert!(!view.connected);
    assert_eq!(view.error, Some(WalletError::ProviderNotFound.to_string()));

    assert_eq!(client.connect().await, Err(WalletError::ProviderNotFound));
    assert!(client.handle().unwrap().is_none());
}

/// Test: Declined access shows the wallet's message and allows a retry
#[tokio::test]
async fn declined_access_can_be_retried() {
    let (wallet, client) = setup(vec![ALICE]);
    client.initialize().unwrap();

    wallet.reject_next_access("User rejected the request.");
    assert_eq!(client.connect().await, Err(WalletError::Rejected("User rejected the request.".into())));
    assert_eq!(client.session().unwrap().state, SessionState::ReadyToConnect);
    assert_eq!(client.view().unwrap().error.as_deref(), Some("User rejected the request."));

    assert_eq!(client.connect().await, Ok(ALICE));
    assert_eq!(client.view().unwrap().error, None);
}

/// Test: A wallet with no accounts does not connect
#[tokio::test]
async fn empty_grant_is_no_accounts() {
    let (_wallet, client) = setup(Vec::new());
    client.initialize().unwrap();
    assert_eq!(client.connect().await, Err(WalletError::NoAccounts));
    assert_eq!(client.session().unwrap().state, SessionState::ReadyToConnect);
}

/// Test: Account switch rebuilds the handle under the new signer
#[tokio::test]
async fn account_switch_rebinds() {
    let (wallet, client) = connected(vec![ALICE, BOB]).await;
    wallet.fund(BOB, units(1, 0));
    let before = client.handle().unwrap().expect("handle");

    wallet.set_accounts(vec![BOB, ALICE]);
    assert_eq!(client.process_account_changes().await, Ok(1));

    let after = client.handle().unwrap().expect("handle");
    assert_eq!(after.signer(), BOB);
    assert!(after.epoch() > before.epoch());

    let view = client.view().unwrap();
    assert_eq!(view.owner_address, Some(BOB.to_checksum(None)));
    assert_eq!(view.balance.as_deref(), Some("1.0"));

    // the old handle is refused before anything reaches the wallet
    let binding = ContractBinding::new(CONFIG.contract, wallet.clone());
    let calls = wallet.eth_calls();
    let stale = binding.query(&client.session().unwrap(), &before, ALICE).await;
    assert_eq!(stale, Err(WalletError::StaleHandle));
    assert_eq!(wallet.eth_calls(), calls);
}

/// Test: Same first account reordered is not an identity change
#[tokio::test]
async fn reordered_accounts_keep_the_handle() {
    let (wallet, client) = connected(vec![ALICE, BOB]).await;
    let epoch = client.handle().unwrap().unwrap().epoch();

    wallet.set_accounts(vec![ALICE]);
    client.process_account_changes().await.unwrap();
    assert_eq!(client.handle().unwrap().unwrap().epoch(), epoch);
}

/// Test: Changes are applied in the order the wallet emitted them
#[tokio::test]
async fn queued_changes_apply_in_order() {
    let (wallet, client) = connected(vec![ALICE, BOB]).await;

    wallet.set_accounts(vec![BOB]);
    wallet.set_accounts(Vec::new());
    assert_eq!(client.process_account_changes().await, Ok(2));

    let session = client.session().unwrap();
    assert_eq!(session.state, SessionState::Disconnected);
    assert_eq!(session.active_account, None);
    assert!(client.handle().unwrap().is_none());
    assert_eq!(client.view().unwrap().error, Some(WalletError::NoAccounts.to_string()));
}

/// Test: Emptied account set drops the session and later queries stay local
#[tokio::test]
async fn revoked_accounts_disconnect() {
    let (wallet, client) = connected(vec![ALICE]).await;

    assert_eq!(client.apply_account_change(ledgerlink::AccountChange::NoAccount), Ok(Transition::Dropped));
    let view = client.view().unwrap();
    assert!(!view.connected);
    assert_eq!(view.owner_address, None);

    let calls = wallet.eth_calls();
    assert_eq!(client.refresh_balance().await, Err(WalletError::NotConnected));
    assert_eq!(wallet.eth_calls(), calls);

    client.set_amount("1").unwrap();
    assert_eq!(client.deposit().await, Err(WalletError::NotConnected));
    assert!(wallet.sent_transactions().is_empty());
}

// =============================================================================
// Operations
// =============================================================================

/// Test: Deposit of 1.5 sends 1.5e18 base units and updates the balance
#[tokio::test]
async fn deposit_sends_base_units() {
    let (wallet, client) = connected(vec![ALICE]).await;

    client.set_amount("1.5").unwrap();
    let op = client.deposit().await.expect("deposit");
    assert_eq!(op.kind, OperationKind::Deposit);
    assert_eq!(op.status, OperationStatus::Confirmed);
    assert_eq!(op.amount, U256::from(1_500_000_000_000_000_000u128));
    assert_eq!(op.signer, Some(ALICE));
    assert!(op.tx_hash.is_some());

    let sent = wallet.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, ALICE);
    assert_eq!(sent[0].to, CONFIG.contract);
    assert_eq!(sent[0].value, units(1, 5));
    assert_eq!(sent[0].data[..4], ILedger::depositCall::SELECTOR);

    assert_eq!(wallet.balance_of(ALICE), units(1, 5));
    let view = client.view().unwrap();
    assert_eq!(view.balance.as_deref(), Some("1.5"));
    assert_eq!(view.amount, "");
    assert_eq!(client.coordinator().last_report().unwrap().error, None);
}

/// Test: Withdraw reduces the ledger balance
#[tokio::test]
async fn withdraw_reduces_balance() {
    let (wallet, client) = connected(vec![ALICE]).await;
    wallet.fund(ALICE, units(5, 0));

    client.set_amount("2").unwrap();
    client.withdraw().await.expect("withdraw");

    assert_eq!(wallet.balance_of(ALICE), units(3, 0));
    assert_eq!(client.view().unwrap().balance.as_deref(), Some("3.0"));
    assert_eq!(wallet.sent_transactions()[0].value, U256::ZERO);
}

/// Test: Transfer moves funds and clears both inputs
#[tokio::test]
async fn transfer_moves_funds() {
    let (wallet, client) = connected(vec![ALICE]).await;
    wallet.fund(ALICE, units(1, 0));

    client.set_amount("0.25").unwrap();
    client.set_recipient(format!("{BOB:x}")).unwrap();
    let op = client.transfer().await.expect("transfer");
    assert_eq!(op.recipient, Some(BOB));

    let quarter = U256::from(250_000_000_000_000_000u128);
    assert_eq!(wallet.balance_of(BOB), quarter);
    assert_eq!(wallet.balance_of(ALICE), units(1, 0) - quarter);

    let view = client.view().unwrap();
    assert_eq!(view.amount, "");
    assert_eq!(view.recipient, "");
    assert_eq!(view.balance.as_deref(), Some("0.75"));
}

/// Test: Malformed recipient is caught before any provider call
#[tokio::test]
async fn invalid_recipient_stays_local() {
    let (wallet, client) = connected(vec![ALICE]).await;
    let calls = wallet.eth_calls();

    client.set_amount("1").unwrap();
    client.set_recipient("not-an-address").unwrap();
    assert_eq!(client.transfer().await, Err(WalletError::InvalidRecipient));

    assert!(wallet.sent_transactions().is_empty());
    assert_eq!(wallet.eth_calls(), calls);
    let view = client.view().unwrap();
    assert_eq!(view.error.as_deref(), Some("Please enter a valid recipient address."));
    assert_eq!(view.recipient, "not-an-address");
}

/// Test: Zero, negative and non-numeric amounts are rejected locally
#[tokio::test]
async fn invalid_amounts_stay_local() {
    let (wallet, client) = connected(vec![ALICE]).await;

    for amount in ["", "0", "-1", "abc", "0.0"] {
        client.set_amount(amount).unwrap();
        assert_eq!(client.deposit().await, Err(WalletError::InvalidAmount), "amount {amount:?}");
        assert_eq!(client.view().unwrap().error.as_deref(), Some("Please enter a valid amount."));
    }
    assert!(wallet.sent_transactions().is_empty());
}

/// Test: Declined signature keeps the input and shows the wallet's message
#[tokio::test]
async fn declined_signature_keeps_input() {
    let (wallet, client) = connected(vec![ALICE]).await;
    wallet.fund(ALICE, units(5, 0));
    client.refresh_balance().await.expect("balance");
    let message = "MetaMask Tx Signature: User denied transaction signature.";

    client.set_amount("2.0").unwrap();
    wallet.reject_next_signature(message);
    assert_eq!(client.withdraw().await, Err(WalletError::Rejected(message.into())));

    let view = client.view().unwrap();
    assert_eq!(view.amount, "2.0");
    assert_eq!(view.error.as_deref(), Some(message));
    assert_eq!(view.balance.as_deref(), Some("5.0"));
    assert_eq!(wallet.balance_of(ALICE), units(5, 0));

    let report = client.coordinator().last_report().unwrap();
    assert_eq!(report.operation.status, OperationStatus::Failed);
    assert_eq!(report.error.as_deref(), Some(message));
}

/// Test: A transaction mined as reverted fails the operation
#[tokio::test]
async fn reverted_receipt_fails() {
    let (wallet, client) = connected(vec![ALICE]).await;
    wallet.set_preflight(false);

    client.set_amount("1").unwrap();
    let err = client.withdraw().await.unwrap_err();
    assert!(matches!(err, WalletError::Reverted(_)), "{err:?}");
    assert_eq!(wallet.sent_transactions().len(), 1);
    assert_eq!(client.coordinator().last_report().unwrap().operation.status, OperationStatus::Failed);
    assert!(client.coordinator().current().is_none());
}

/// Test: A second request while one is in flight is rejected as busy
#[tokio::test]
async fn concurrent_request_is_busy() {
    let (wallet, client) = connected(vec![ALICE]).await;
    wallet.fund(ALICE, units(5, 0));
    wallet.hold_confirmations();

    client.set_amount("1").unwrap();
    let second = async {
        wait_until_submitted(&client).await;
        let busy = client.withdraw().await;
        wallet.release_confirmations();
        busy
    };
    let (first, second) = tokio::join!(client.deposit(), second);

    assert_eq!(first.expect("deposit").status, OperationStatus::Confirmed);
    assert_eq!(second, Err(WalletError::Busy(OperationKind::Deposit)));
    assert_eq!(wallet.sent_transactions().len(), 1);
    assert_eq!(wallet.balance_of(ALICE), units(6, 0));

    // slot is free again
    client.set_amount("1").unwrap();
    assert!(client.withdraw().await.is_ok());
}

/// Test: Session dropped mid-flight abandons the operation
#[tokio::test]
async fn dropped_session_abandons_operation() {
    let (wallet, client) = connected(vec![ALICE]).await;
    wallet.hold_confirmations();

    client.set_amount("1").unwrap();
    let revoke = async {
        wait_until_submitted(&client).await;
        wallet.set_accounts(Vec::new());
        let applied = client.process_account_changes().await;
        wallet.release_confirmations();
        applied
    };
    let (outcome, applied) = tokio::join!(client.deposit(), revoke);

    assert_eq!(applied, Ok(1));
    assert_eq!(outcome, Err(WalletError::Abandoned(OperationKind::Deposit)));
    let report = client.coordinator().last_report().unwrap();
    assert_eq!(report.operation.status, OperationStatus::Abandoned);
    assert!(report.operation.tx_hash.is_some());

    // the banner shows the disconnect, not the abandoned operation
    let view = client.view().unwrap();
    assert!(!view.connected);
    assert_eq!(view.error, Some(WalletError::NoAccounts.to_string()));
    assert_eq!(view.amount, "1");

    let calls = wallet.eth_calls();
    assert_eq!(client.refresh_balance().await, Err(WalletError::NotConnected));
    assert_eq!(wallet.eth_calls(), calls);
}

/// Test: Account switch mid-flight abandons the operation and says so
#[tokio::test]
async fn switched_account_abandons_operation() {
    let (wallet, client) = connected(vec![ALICE, BOB]).await;
    wallet.hold_confirmations();

    client.set_amount("1").unwrap();
    let switch = async {
        wait_until_submitted(&client).await;
        wallet.set_accounts(vec![BOB, ALICE]);
        let applied = client.process_account_changes().await;
        wallet.release_confirmations();
        applied
    };
    let (outcome, applied) = tokio::join!(client.deposit(), switch);

    assert_eq!(applied, Ok(1));
    assert_eq!(outcome, Err(WalletError::Abandoned(OperationKind::Deposit)));
    assert_eq!(client.coordinator().last_report().unwrap().operation.status, OperationStatus::Abandoned);
    assert_eq!(client.handle().unwrap().unwrap().signer(), BOB);

    // still connected, so the banner carries the abandoned operation
    let view = client.view().unwrap();
    assert!(view.connected);
    let banner = view.error.expect("banner");
    assert_eq!(banner, WalletError::Abandoned(OperationKind::Deposit).to_string());
    assert!(banner.contains("account changed"));
    assert_eq!(view.amount, "1");
}

/// Test: Address visibility toggle only affects the view
#[tokio::test]
async fn toggle_hides_owner_address() {
    let (_wallet, client) = connected(vec![ALICE]).await;
    assert_eq!(client.toggle_address(), Ok(false));
    let view = client.view().unwrap();
    assert!(view.connected);
    assert_eq!(view.owner_address, None);
    assert_eq!(client.toggle_address(), Ok(true));
    assert!(client.view().unwrap().owner_address.is_some());
}
