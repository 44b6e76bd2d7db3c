//! EIP-1193 provider backed by the browser's `window.ethereum`.

use super::{TxReceipt, TxRequest, WalletProvider};
use crate::error::ProviderError;
use alloy_primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use futures::channel::mpsc;
use js_sys::{Function, Promise, Reflect};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

/// Default pause between `eth_getTransactionReceipt` polls.
pub const RECEIPT_POLL_MS: i32 = 1_000;

type Listeners = Rc<RefCell<Vec<mpsc::UnboundedSender<Vec<Address>>>>>;

pub struct Eip1193Provider {
    ethereum: Option<JsValue>,
    listeners: Listeners,
    poll_ms: i32,
    // kept alive for as long as the wallet may call it
    _on_accounts: Option<Closure<dyn FnMut(JsValue)>>,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    status: Option<String>,
    block_number: Option<String>,
}

impl Eip1193Provider {
    /// Look up `window.ethereum` once and hook its `accountsChanged` event.
    pub fn detect() -> Self {
        let ethereum = web_sys::window()
            .and_then(|window| Reflect::get(&window, &JsValue::from_str("ethereum")).ok())
            .filter(|value| !value.is_undefined() && !value.is_null());
        let listeners: Listeners = Rc::new(RefCell::new(Vec::new()));

        let on_accounts = ethereum.as_ref().and_then(|ethereum| {
            let fanout = listeners.clone();
            let closure = Closure::<dyn FnMut(JsValue)>::new(move |accounts: JsValue| {
                let accounts: Vec<Address> = match serde_wasm_bindgen::from_value(accounts) {
                    Ok(accounts) => accounts,
                    Err(e) => {
                        tracing::warn!("unreadable accountsChanged payload: {}", e);
                        return;
                    }
                };
                fanout.borrow_mut().retain(|tx| tx.unbounded_send(accounts.clone()).is_ok());
            });
            let on = Reflect::get(ethereum, &JsValue::from_str("on")).ok()?.dyn_into::<Function>().ok()?;
            match on.call2(ethereum, &JsValue::from_str("accountsChanged"), closure.as_ref().unchecked_ref()) {
                Ok(_) => Some(closure),
                Err(e) => {
                    tracing::warn!("could not subscribe to accountsChanged: {:?}", e);
                    None
                }
            }
        });

        Self { ethereum, listeners, poll_ms: RECEIPT_POLL_MS, _on_accounts: on_accounts }
    }

    pub fn with_poll_interval(mut self, ms: i32) -> Self {
        self.poll_ms = ms.max(1);
        self
    }

    async fn request(&self, method: &str, params: Value) -> Result<JsValue, ProviderError> {
        let ethereum = self
            .ethereum
            .as_ref()
            .ok_or_else(|| ProviderError::Transport("window.ethereum is not available".into()))?;
        let request = Reflect::get(ethereum, &JsValue::from_str("request"))
            .and_then(|f| f.dyn_into::<Function>())
            .map_err(provider_error)?;
        let args = RpcRequest { method, params }
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let promise = request
            .call1(ethereum, &args)
            .map_err(provider_error)?
            .dyn_into::<Promise>()
            .map_err(|_| ProviderError::Transport(format!("{method} did not return a promise")))?;
        JsFuture::from(promise).await.map_err(provider_error)
    }
}

fn decode<T: for<'de> Deserialize<'de>>(value: JsValue) -> Result<T, ProviderError> {
    serde_wasm_bindgen::from_value(value).map_err(|e| ProviderError::Transport(e.to_string()))
}

/// `{code, message}` error objects become Rejected/Rpc; anything else is a
/// transport failure.
fn provider_error(err: JsValue) -> ProviderError {
    let field = |name: &str| Reflect::get(&err, &JsValue::from_str(name)).ok();
    let message = field("message").and_then(|m| m.as_string()).unwrap_or_else(|| format!("{:?}", err));
    match field("code").and_then(|c| c.as_f64()) {
        Some(code) => ProviderError::from_code(code as i64, message),
        None => ProviderError::Transport(message),
    }
}

fn quantity(raw: &str) -> Option<u64> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

async fn sleep(ms: i32) {
    let promise = Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window()
            .map(|window| window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms).is_ok())
            .unwrap_or(false);
        if !scheduled {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = JsFuture::from(promise).await;
}

#[async_trait(?Send)]
impl WalletProvider for Eip1193Provider {
    fn is_present(&self) -> bool { self.ethereum.is_some() }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        decode(self.request("eth_requestAccounts", json!([])).await?)
    }

    fn subscribe_accounts(&self) -> mpsc::UnboundedReceiver<Vec<Address>> {
        let (tx, rx) = mpsc::unbounded();
        self.listeners.borrow_mut().push(tx);
        rx
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        decode(self.request("eth_call", json!([{ "to": to, "data": data }, "latest"])).await?)
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash, ProviderError> {
        let params = json!([{ "from": tx.from, "to": tx.to, "value": tx.value, "data": tx.data }]);
        decode(self.request("eth_sendTransaction", params).await?)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt, ProviderError> {
        loop {
            let value = self.request("eth_getTransactionReceipt", json!([hash])).await?;
            if value.is_null() || value.is_undefined() {
                sleep(self.poll_ms).await;
                continue;
            }
            let receipt: RpcReceipt = decode(value)?;
            return Ok(TxReceipt {
                hash: receipt.transaction_hash,
                success: receipt.status.as_deref().and_then(quantity) == Some(1),
                block_number: receipt.block_number.as_deref().and_then(quantity),
            });
        }
    }
}
