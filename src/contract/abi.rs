//! Ledger contract interface.

use alloy_sol_types::{sol, SolCall};

sol! {
    interface ILedger {
        function getBalance(address account) external view returns (uint256 balance);
        function deposit() external payable;
        function withdraw(uint256 amount) external;
        function transferToken(address recipient, uint256 amount) external;
    }
}

/// One entry point of the contract interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub signature: &'static str,
    pub selector: [u8; 4],
    pub mutating: bool,
    pub payable: bool,
}

/// Immutable descriptor of the ledger interface a handle is bound to.
#[derive(Debug, PartialEq, Eq)]
pub struct LedgerSchema {
    pub get_balance: EntryPoint,
    pub deposit: EntryPoint,
    pub withdraw: EntryPoint,
    pub transfer_token: EntryPoint,
}

pub static LEDGER_SCHEMA: LedgerSchema = LedgerSchema {
    get_balance: EntryPoint {
        signature: ILedger::getBalanceCall::SIGNATURE,
        selector: ILedger::getBalanceCall::SELECTOR,
        mutating: false,
        payable: false,
    },
    deposit: EntryPoint {
        signature: ILedger::depositCall::SIGNATURE,
        selector: ILedger::depositCall::SELECTOR,
        mutating: true,
        payable: true,
    },
    withdraw: EntryPoint {
        signature: ILedger::withdrawCall::SIGNATURE,
        selector: ILedger::withdrawCall::SELECTOR,
        mutating: true,
        payable: false,
    },
    transfer_token: EntryPoint {
        signature: ILedger::transferTokenCall::SIGNATURE,
        selector: ILedger::transferTokenCall::SELECTOR,
        mutating: true,
        payable: false,
    },
};

impl LedgerSchema {
    pub fn entries(&self) -> [&EntryPoint; 4] {
        [&self.get_balance, &self.deposit, &self.withdraw, &self.transfer_token]
    }

    pub fn by_selector(&self, selector: &[u8]) -> Option<&EntryPoint> {
        self.entries().into_iter().find(|entry| entry.selector.as_slice() == selector)
    }
}
