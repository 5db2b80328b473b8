pub mod bootstrap;
pub mod msg;
pub mod relay;

#[cfg(target_arch = "wasm32")]
pub mod shim;

pub mod prelude {
    pub use super::msg::{ERROR, QUERY, RESULT};
    pub use super::relay::{ErrorInfo, WorkerEvent, WorkerId};
    pub use super::{ContextKind, WorkerError};
    #[cfg(target_arch = "wasm32")]
    pub use super::{WorkerBuilder, WorkerHandle};
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    /// The payload cannot cross the wire. Raised synchronously at the call
    /// site; nothing is queued or sent.
    #[error("payload is not serializable: {0}")]
    Serialize(String),

    #[error("failed to post message: {0}")]
    Post(String),

    #[error("web api failure: {0}")]
    Web(String),
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for WorkerError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        Self::Web(stringify_js(&value))
    }
}

#[cfg(target_arch = "wasm32")]
impl From<serde_wasm_bindgen::Error> for WorkerError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
fn stringify_js(value: &wasm_bindgen::JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// Kind of the current execution context.
///
/// Detection is an explicit call, not a flag computed at load time, so test
/// doubles can classify arbitrary globals through [`ContextKind::of_global`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// The page's main thread.
    Page,
    /// An isolated worker context.
    Worker,
}

impl ContextKind {
    /// Classifies the global scope this code is currently running in.
    #[cfg(target_arch = "wasm32")]
    pub fn detect() -> Self {
        Self::of_global(&js_sys::global())
    }

    /// Classifies an arbitrary global object by probing for the worker-only
    /// script-import primitive.
    #[cfg(target_arch = "wasm32")]
    pub fn of_global(global: &wasm_bindgen::JsValue) -> Self {
        if crate::util::web::has_import_scripts(global) {
            Self::Worker
        } else {
            Self::Page
        }
    }

    pub fn is_worker(self) -> bool {
        matches!(self, Self::Worker)
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::*;

#[cfg(target_arch = "wasm32")]
mod web {
    use super::{
        bootstrap::Bootstrap,
        msg,
        relay::{ErrorInfo, RelayCore, WorkerEvent, WorkerId},
        stringify_js, WorkerError,
    };
    use crate::util::web as web_util;
    use serde::Serialize;
    use std::{cell::RefCell, fmt, rc::Rc};
    use wasm_bindgen::{closure::Closure, JsCast, JsValue};

    /// Spawns a worker running `module_id` with non-default settings.
    ///
    /// ```ignore
    /// let worker = WorkerBuilder::new("game/prime")
    ///     .with_module_root("./modules/")
    ///     .spawn()?;
    /// ```
    #[derive(Debug)]
    pub struct WorkerBuilder<'a> {
        module_id: &'a str,
        module_root: &'a str,
        name: Option<&'a str>,
        loader: &'a str,
    }

    impl<'a> WorkerBuilder<'a> {
        pub const fn new(module_id: &'a str) -> Self {
            Self {
                module_id,
                module_root: "./",
                name: None,
                loader: Bootstrap::DEFAULT_LOADER,
            }
        }

        /// Module-loading root, resolved against the document base URI at
        /// spawn time.
        pub const fn with_module_root(mut self, module_root: &'a str) -> Self {
            self.module_root = module_root;
            self
        }

        /// Worker name shown in the browser's dev tool. Defaults to the
        /// generated worker id.
        pub const fn with_name(mut self, name: &'a str) -> Self {
            self.name = Some(name);
            self
        }

        /// Name of the module-loader global inside the worker.
        pub const fn with_loader(mut self, loader: &'a str) -> Self {
            self.loader = loader;
            self
        }

        pub fn spawn(self) -> Result<WorkerHandle, WorkerError> {
            WorkerHandle::spawn(self)
        }
    }

    type SharedCore = Rc<RefCell<RelayCore<JsValue>>>;

    /// Main-thread proxy of one spawned worker and its two message queues.
    ///
    /// Dropping the handle terminates the worker and releases the generated
    /// script URL; [`close`](Self::close) does the same eagerly.
    pub struct WorkerHandle {
        /// JS worker handle.
        handle: web_sys::Worker,

        /// Object URL of the generated bootstrap, owned until teardown.
        script_url: Option<String>,

        core: SharedCore,

        /// Callbacks for worker responses, kept alive for the worker's
        /// lifetime.
        _onmsg: Closure<dyn FnMut(web_sys::MessageEvent)>,
        _onerr: Closure<dyn FnMut(web_sys::ErrorEvent)>,
    }

    impl WorkerHandle {
        /// Spawns a worker running `module_id` with default settings.
        pub fn new(module_id: &str) -> Result<Self, WorkerError> {
            WorkerBuilder::new(module_id).spawn()
        }

        fn spawn(builder: WorkerBuilder) -> Result<Self, WorkerError> {
            let id = WorkerId::generate(builder.module_id);

            let module_root = web_util::resolve_url(builder.module_root)?;
            let source = Bootstrap::new(module_root, builder.module_id)
                .with_scripts(web_util::document_script_urls())
                .with_loader(builder.loader)
                .assemble();
            let script_url = web_util::script_url(&source)?;

            // Classic worker: the bootstrap replays page scripts through
            // importScripts, which module workers don't have.
            let opt = web_sys::WorkerOptions::new();
            opt.set_name(builder.name.unwrap_or_else(|| id.as_str()));
            let handle = match web_sys::Worker::new_with_options(&script_url, &opt) {
                Ok(handle) => handle,
                Err(err) => {
                    web_util::revoke_script_url(&script_url);
                    return Err(WorkerError::Spawn(stringify_js(&err)));
                }
            };

            let core: SharedCore = Rc::new(RefCell::new(RelayCore::new(id)));

            let onmsg = {
                let core = Rc::clone(&core);
                let handle = handle.clone();
                Closure::new(move |ev: web_sys::MessageEvent| {
                    on_message(&core, &handle, ev.data());
                })
            };
            handle.set_onmessage(Some(onmsg.as_ref().unchecked_ref()));

            let onerr = {
                let core = Rc::clone(&core);
                Closure::new(move |ev: web_sys::ErrorEvent| on_error(&core, &ev))
            };
            handle.set_onerror(Some(onerr.as_ref().unchecked_ref()));

            Ok(Self {
                handle,
                script_url: Some(script_url),
                core,
                _onmsg: onmsg,
                _onerr: onerr,
            })
        }

        pub fn id(&self) -> WorkerId {
            self.core.borrow().id().clone()
        }

        /// True once the worker's readiness announcement has arrived. Alive
        /// is terminal; a worker never reverts.
        pub fn is_alive(&self) -> bool {
            self.core.borrow().is_alive()
        }

        /// Sends `data` to the worker as a query. Before the worker is
        /// alive, queries are buffered and replayed in order at the liveness
        /// transition; afterwards they are sent immediately.
        pub fn post<T>(&self, data: &T) -> Result<(), WorkerError>
        where
            T: Serialize + ?Sized,
        {
            let data = data.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?;
            self.post_js(data)
        }

        /// Like [`post`](Self::post) for an already-converted value.
        pub fn post_js(&self, data: JsValue) -> Result<(), WorkerError> {
            let mut res = Ok(());
            self.core.borrow_mut().post(data, |data| {
                if let Err(err) = msg::MsgQuery(data).post_to(&self.handle) {
                    res = Err(WorkerError::Post(stringify_js(&err)));
                }
            });
            res
        }

        /// Removes and returns every accumulated event, oldest first.
        /// Designed for per-frame polling from the render loop.
        pub fn get(&self) -> Vec<WorkerEvent<JsValue>> {
            self.core.borrow_mut().drain()
        }

        /// Terminates the worker and releases the generated script URL.
        pub fn close(mut self) {
            self.shutdown();
        }

        fn shutdown(&mut self) {
            self.handle.terminate();
            if let Some(url) = self.script_url.take() {
                web_util::revoke_script_url(&url);
            }
        }
    }

    fn on_message(core: &SharedCore, worker: &web_sys::Worker, data: JsValue) {
        match msg::tag_of(&data) {
            Some(msg::ALIVE) => {
                // First alive flips the state and flushes the pending queue
                // in enqueue order. Later alives are ignored by the core.
                let mut failed = Vec::new();
                core.borrow_mut().set_alive(|pending| {
                    if let Err(err) = msg::MsgQuery(pending).post_to(worker) {
                        failed.push(stringify_js(&err));
                    }
                });
                // A query lost at the flush never produces a reply, so the
                // loss is reported as an error event. Line 0: no script
                // location is involved.
                let mut core = core.borrow_mut();
                for message in failed {
                    crate::error!("[{}] failed to flush pending query: {message}", core.id());
                    core.push_error(ErrorInfo { line: 0, message });
                }
            }
            Some(msg::LOG) => {
                // Forwarded to the console, attributed to the worker.
                // Produces no event.
                let args = msg::MsgLog::read_args(&data);
                let line = js_sys::Array::new();
                line.push(&JsValue::from_str(&format!("[{}]", core.borrow().id())));
                for arg in args.iter() {
                    line.push(&arg);
                }
                web_sys::console::log(&line);
            }
            // Anything else is a result payload from user code.
            Some(_) => core.borrow_mut().push_result(msg::data_of(&data)),
            None => core.borrow_mut().push_result(data),
        }
    }

    fn on_error(core: &SharedCore, ev: &web_sys::ErrorEvent) {
        let info = ErrorInfo {
            line: ev.lineno(),
            message: ev.message(),
        };
        crate::error!("[{}] {} (line {})", core.borrow().id(), info.message, info.line);
        core.borrow_mut().push_error(info);
    }

    impl fmt::Debug for WorkerHandle {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let core = self.core.borrow();
            f.debug_struct("WorkerHandle")
                .field("id", &core.id())
                .field("alive", &core.is_alive())
                .finish_non_exhaustive()
        }
    }

    impl Drop for WorkerHandle {
        /// Terminates the web worker *immediately*.
        fn drop(&mut self) {
            self.shutdown();
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

        wasm_bindgen_test_configure!(run_in_browser);

        #[wasm_bindgen_test]
        fn unsendable_pending_query_becomes_an_error_event() {
            let url = web_util::script_url("").unwrap();
            let worker = web_sys::Worker::new(&url).unwrap();

            let core: SharedCore =
                Rc::new(RefCell::new(RelayCore::new(WorkerId::generate("prime"))));
            // Functions cannot cross the structured-clone boundary, so the
            // flush of this query fails at postMessage.
            core.borrow_mut()
                .post(js_sys::Function::new_no_args("").into(), |_| {});

            on_message(&core, &worker, msg::MsgAlive.write());

            assert!(core.borrow().is_alive());
            let events = core.borrow_mut().drain();
            assert_eq!(events.len(), 1);
            let info = events[0].error_info().unwrap();
            assert_eq!(info.line, 0);
            assert!(!info.message.is_empty());

            worker.terminate();
            web_util::revoke_script_url(&url);
        }
    }
}
