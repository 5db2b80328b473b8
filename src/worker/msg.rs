//! Wire protocol between the main thread and a worker.
//!
//! Every value crossing the boundary is a tagged record `{ type, data }`.
//! Tags and event kinds share one numbering space so that application code
//! can match on a single set of constants.

/// Wire tag of the one-time readiness announcement (worker to main).
pub(crate) const ALIVE: u32 = 0;

/// Wire tag of a remote console log (worker to main).
pub(crate) const LOG: u32 = 1;

/// Event kind of an uncaught worker error.
pub const ERROR: u32 = 2;

/// Wire tag and event kind of a result payload (worker to main).
pub const RESULT: u32 = 3;

/// Wire tag of a query payload (main to worker).
pub const QUERY: u32 = 4;

#[cfg(target_arch = "wasm32")]
pub(crate) use web::*;

#[cfg(target_arch = "wasm32")]
mod web {
    use super::*;
    use crate::util::web as web_util;
    use wasm_bindgen::{JsCast, JsValue};

    const TYPE_KEY: &str = "type";
    const DATA_KEY: &str = "data";

    /// Reads the wire tag of an incoming message.
    /// Returns `None` for values that are not tagged records.
    pub(crate) fn tag_of(value: &JsValue) -> Option<u32> {
        let tag = js_sys::Reflect::get(value, &JsValue::from_str(TYPE_KEY)).ok()?;
        tag.as_f64().map(|tag| tag as u32)
    }

    /// Reads the payload of an incoming message.
    pub(crate) fn data_of(value: &JsValue) -> JsValue {
        js_sys::Reflect::get(value, &JsValue::from_str(DATA_KEY)).unwrap_or(JsValue::UNDEFINED)
    }

    fn write_tagged(tag: u32, data: Option<&JsValue>) -> JsValue {
        let record = js_sys::Object::new();
        // Setting a property on a fresh object cannot fail.
        let _ = js_sys::Reflect::set(
            &record,
            &JsValue::from_str(TYPE_KEY),
            &JsValue::from_f64(tag as f64),
        );
        if let Some(data) = data {
            let _ = js_sys::Reflect::set(&record, &JsValue::from_str(DATA_KEY), data);
        }
        record.into()
    }

    /// Readiness announcement. Carries no payload.
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct MsgAlive;

    impl MsgAlive {
        pub(crate) fn write(self) -> JsValue {
            write_tagged(ALIVE, None)
        }

        /// Posts from the worker context to the main thread.
        pub(crate) fn post(self) -> Result<(), JsValue> {
            web_util::worker_post_message(&self.write())
        }
    }

    /// Remote console log carrying an ordered argument list.
    #[derive(Debug, Clone)]
    pub(crate) struct MsgLog(pub(crate) js_sys::Array);

    impl MsgLog {
        pub(crate) fn write(self) -> JsValue {
            write_tagged(LOG, Some(self.0.as_ref()))
        }

        /// Posts from the worker context to the main thread.
        pub(crate) fn post(self) -> Result<(), JsValue> {
            web_util::worker_post_message(&self.write())
        }

        /// Reads the argument list back on the main side.
        pub(crate) fn read_args(value: &JsValue) -> js_sys::Array {
            data_of(value)
                .dyn_into::<js_sys::Array>()
                .unwrap_or_else(|_| js_sys::Array::new())
        }
    }

    /// Result payload returned by worker-side application code.
    #[derive(Debug, Clone)]
    pub(crate) struct MsgResult(pub(crate) JsValue);

    impl MsgResult {
        pub(crate) fn write(self) -> JsValue {
            write_tagged(RESULT, Some(&self.0))
        }

        /// Posts from the worker context to the main thread.
        pub(crate) fn post(self) -> Result<(), JsValue> {
            web_util::worker_post_message(&self.write())
        }
    }

    /// Query payload sent from the main thread to a worker.
    #[derive(Debug, Clone)]
    pub(crate) struct MsgQuery(pub(crate) JsValue);

    impl MsgQuery {
        pub(crate) fn write(self) -> JsValue {
            write_tagged(QUERY, Some(&self.0))
        }

        pub(crate) fn post_to(self, worker: &web_sys::Worker) -> Result<(), JsValue> {
            worker.post_message(&self.write())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use wasm_bindgen_test::wasm_bindgen_test;

        #[wasm_bindgen_test]
        fn query_keeps_tag_and_payload() {
            let payload = JsValue::from_f64(9.0);
            let wire = MsgQuery(payload.clone()).write();
            assert_eq!(tag_of(&wire), Some(QUERY));
            assert_eq!(data_of(&wire), payload);
        }

        #[wasm_bindgen_test]
        fn alive_carries_no_payload() {
            let wire = MsgAlive.write();
            assert_eq!(tag_of(&wire), Some(ALIVE));
            assert!(data_of(&wire).is_undefined());
        }

        #[wasm_bindgen_test]
        fn log_preserves_argument_order() {
            let args = js_sys::Array::new();
            args.push(&JsValue::from_str("a"));
            args.push(&JsValue::from_f64(2.0));
            let wire = MsgLog(args).write();

            assert_eq!(tag_of(&wire), Some(LOG));
            let read = MsgLog::read_args(&wire);
            assert_eq!(read.length(), 2);
            assert_eq!(read.get(0).as_string().as_deref(), Some("a"));
        }

        #[wasm_bindgen_test]
        fn untagged_values_have_no_tag() {
            assert_eq!(tag_of(&JsValue::from_str("plain")), None);
            assert_eq!(tag_of(&JsValue::NULL), None);
        }
    }
}
