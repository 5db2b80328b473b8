//! In-worker runtime for worker modules that are themselves wasm.
//!
//! The generated JS bootstrap carries its own copy of this shim for plain JS
//! modules. A wasm worker module calls [`init`] instead: it takes over the
//! global message handler, feeds incoming queries into a worker-local queue,
//! and announces readiness. The helpers below speak the same wire protocol
//! as the JS side.

use crate::{
    util::web as web_util,
    worker::{msg, WorkerError},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{cell::RefCell, collections::VecDeque};
use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};

thread_local! {
    /// Worker-local inbound queue of query payloads.
    static QUERIES: RefCell<VecDeque<JsValue>> = const { RefCell::new(VecDeque::new()) };

    /// Keeps the installed message handler alive.
    static ONMESSAGE: RefCell<Option<Closure<dyn FnMut(web_sys::MessageEvent)>>> =
        const { RefCell::new(None) };
}

/// Installs the message handler and announces readiness.
///
/// Call once from the worker module's entry point before doing any work, so
/// the main thread never observes the module running while still dead.
/// Repeated alive announcements are tolerated on the main side.
pub fn init() -> Result<(), WorkerError> {
    web_util::set_panic_hook_once();

    let handler: Closure<dyn FnMut(web_sys::MessageEvent)> =
        Closure::new(|ev: web_sys::MessageEvent| on_message(ev.data()));
    web_util::worker_global().set_onmessage(Some(handler.as_ref().unchecked_ref()));
    ONMESSAGE.with_borrow_mut(|slot| *slot = Some(handler));

    msg::MsgAlive.post().map_err(WorkerError::from)
}

/// [`init`] for JS callers.
#[wasm_bindgen(js_name = relayInit)]
pub fn relay_init() -> Result<(), JsValue> {
    init().map_err(|err| JsValue::from_str(&err.to_string()))
}

fn on_message(data: JsValue) {
    // Only queries are meaningful inside the worker.
    if msg::tag_of(&data) == Some(msg::QUERY) {
        QUERIES.with_borrow_mut(|queue| queue.push_back(msg::data_of(&data)));
    }
}

/// Takes the oldest pending query, if any.
pub fn next_query() -> Option<JsValue> {
    QUERIES.with_borrow_mut(|queue| queue.pop_front())
}

/// Takes the oldest pending query and deserializes its payload.
pub fn next_query_json<T: DeserializeOwned>() -> Option<Result<T, WorkerError>> {
    next_query().map(|data| serde_wasm_bindgen::from_value(data).map_err(Into::into))
}

/// Takes every pending query, oldest first.
pub fn drain_queries() -> Vec<JsValue> {
    QUERIES.with_borrow_mut(|queue| queue.drain(..).collect())
}

/// Returns `data` to the main thread as a result event.
pub fn post_result<T>(data: &T) -> Result<(), WorkerError>
where
    T: Serialize + ?Sized,
{
    let data = data.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?;
    post_result_js(data)
}

/// Like [`post_result`] for an already-converted value.
pub fn post_result_js(data: JsValue) -> Result<(), WorkerError> {
    msg::MsgResult(data).post().map_err(Into::into)
}

/// Forwards arguments to the main thread's console, attributed there to this
/// worker's id.
pub fn log(args: &js_sys::Array) -> Result<(), WorkerError> {
    msg::MsgLog(args.clone()).post().map_err(Into::into)
}

pub fn log_str(message: &str) -> Result<(), WorkerError> {
    let args = js_sys::Array::new();
    args.push(&JsValue::from_str(message));
    log(&args)
}
