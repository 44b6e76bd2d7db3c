//! WASM module: the ledger client in the browser
//!
//! Wraps [`Client`] over the page's `window.ethereum` and exposes it to
//! JavaScript. Every method returns plain JS values; failures reject with the
//! same message the error banner shows.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           LedgerApp (JS API)            │
//! │  initialize, connect, deposit, ...      │
//! │  view() → render                        │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │        Client<Eip1193Provider>          │
//! │  session, binding, coordinator, view    │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │            window.ethereum              │
//! └─────────────────────────────────────────┘
//! ```

use crate::client::Client;
use crate::config::{check_decimals, parse_contract, ClientConfig};
use crate::provider::Eip1193Provider;
use crate::session::Transition;
use crate::units::format_amount;
use serde::Serialize;
use std::rc::Rc;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct LedgerApp {
    client: Rc<Client<Eip1193Provider>>,
}

#[wasm_bindgen]
impl LedgerApp {
    /// `contract` and `decimals` fall back to the built-in deployment;
    /// `poll_ms` is the receipt polling interval.
    #[wasm_bindgen(constructor)]
    pub fn new(contract: Option<String>, decimals: Option<u8>, poll_ms: Option<i32>) -> Result<LedgerApp, JsValue> {
        let mut config = ClientConfig::default();
        if let Some(contract) = contract {
            config = config.with_contract(parse_contract(&contract).map_err(js_err)?);
        }
        if let Some(decimals) = decimals {
            config = config.with_decimals(check_decimals(decimals).map_err(js_err)?);
        }
        log!("[LedgerApp] contract {}", config.contract);
        let mut provider = Eip1193Provider::detect();
        if let Some(ms) = poll_ms {
            provider = provider.with_poll_interval(ms);
        }
        let provider = Arc::new(provider);
        Ok(Self { client: Rc::new(Client::new(provider, config)) })
    }

    /// Detect the wallet and follow its account changes. `on_change` is
    /// called with the fresh view after each change.
    #[wasm_bindgen]
    pub fn initialize(&self, on_change: Option<js_sys::Function>) -> Result<(), JsValue> {
        self.client.initialize().map_err(js_err)?;
        let client = self.client.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let notify = |_: Transition| {
                if let (Some(callback), Ok(view)) = (on_change.as_ref(), client.view()) {
                    if let Ok(view) = to_js(&view) {
                        let _ = callback.call1(&JsValue::NULL, &view);
                    }
                }
            };
            if let Err(e) = client.watch_accounts(notify).await {
                log!("[LedgerApp] account feed stopped: {}", e);
            }
        });
        Ok(())
    }

    /// Resolves to the connected account, checksummed.
    #[wasm_bindgen]
    pub async fn connect(&self) -> Result<String, JsValue> {
        let account = self.client.connect().await.map_err(js_err)?;
        Ok(account.to_checksum(None))
    }

    #[wasm_bindgen(js_name = "toggleAddress")]
    pub fn toggle_address(&self) -> Result<bool, JsValue> {
        self.client.toggle_address().map_err(js_err)
    }

    #[wasm_bindgen(js_name = "setAmount")]
    pub fn set_amount(&self, amount: String) -> Result<(), JsValue> {
        self.client.set_amount(amount).map_err(js_err)
    }

    #[wasm_bindgen(js_name = "setRecipient")]
    pub fn set_recipient(&self, recipient: String) -> Result<(), JsValue> {
        self.client.set_recipient(recipient).map_err(js_err)
    }

    #[wasm_bindgen]
    pub async fn deposit(&self) -> Result<JsValue, JsValue> {
        let op = self.client.deposit().await.map_err(js_err)?;
        to_js(&op)
    }

    #[wasm_bindgen]
    pub async fn withdraw(&self) -> Result<JsValue, JsValue> {
        let op = self.client.withdraw().await.map_err(js_err)?;
        to_js(&op)
    }

    #[wasm_bindgen]
    pub async fn transfer(&self) -> Result<JsValue, JsValue> {
        let op = self.client.transfer().await.map_err(js_err)?;
        to_js(&op)
    }

    /// Resolves to the balance in display units.
    #[wasm_bindgen(js_name = "refreshBalance")]
    pub async fn refresh_balance(&self) -> Result<String, JsValue> {
        let balance = self.client.refresh_balance().await.map_err(js_err)?;
        Ok(format_amount(balance, self.client.config().decimals))
    }

    #[wasm_bindgen]
    pub fn view(&self) -> Result<JsValue, JsValue> {
        let view = self.client.view().map_err(js_err)?;
        to_js(&view)
    }
}
