//! Main-thread side of the relay protocol.
//!
//! [`RelayCore`] is the whole lifecycle state machine: a worker starts dead,
//! buffers outbound queries until its readiness announcement arrives, then
//! becomes alive for good. It is deliberately free of platform types so the
//! protocol can be exercised on any target.

use crate::{util::str as str_util, worker::msg};
use std::{
    collections::VecDeque,
    fmt, mem,
    rc::Rc,
    sync::atomic::{AtomicU32, Ordering},
};

/// Identifier of one spawned worker, shaped like `module@1a2b3c4d`.
///
/// Uniqueness is probabilistic and not cryptographically strong. The id is
/// only used to attribute log lines and events to their worker, so collisions
/// are harmless.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(Rc<str>);

impl WorkerId {
    pub fn generate(module_id: &str) -> Self {
        // Keeps ids distinct even when no entropy source is available.
        static NEXT: AtomicU32 = AtomicU32::new(0);

        let mut seed = [0_u8; 4];
        let _ = getrandom::getrandom(&mut seed);
        let tag = u32::from_le_bytes(seed).wrapping_add(NEXT.fetch_add(1, Ordering::Relaxed));

        let mut id = String::with_capacity(module_id.len() + 9);
        id.push_str(module_id);
        id.push('@');
        for c in str_util::encode_hex_u32(tag) {
            id.push(c as char);
        }
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location and description of an uncaught error inside a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub line: u32,
    pub message: String,
}

/// What `get()` hands back to the host application, one entry per worker
/// message. Consumed once; the queue is drained, not peeked.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent<M> {
    /// A payload returned by worker-side application code.
    Result { worker: WorkerId, data: M },

    /// An uncaught fault inside the worker. The worker keeps running.
    Error { info: ErrorInfo },
}

impl<M> WorkerEvent<M> {
    /// Discriminant of this event, [`RESULT`](msg::RESULT) or
    /// [`ERROR`](msg::ERROR).
    pub fn kind(&self) -> u32 {
        match self {
            Self::Result { .. } => msg::RESULT,
            Self::Error { .. } => msg::ERROR,
        }
    }

    pub fn data(&self) -> Option<&M> {
        match self {
            Self::Result { data, .. } => Some(data),
            Self::Error { .. } => None,
        }
    }

    /// Id of the worker that produced a result.
    pub fn worker(&self) -> Option<&WorkerId> {
        match self {
            Self::Result { worker, .. } => Some(worker),
            Self::Error { .. } => None,
        }
    }

    pub fn error_info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Result { .. } => None,
            Self::Error { info } => Some(info),
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl WorkerEvent<wasm_bindgen::JsValue> {
    /// Deserializes a result payload. `None` for error events.
    ///
    /// Every call re-deserializes the payload, so callers polling per frame
    /// should call this once per event and keep the typed value.
    pub fn json<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Option<Result<T, crate::worker::WorkerError>> {
        self.data()
            .map(|data| serde_wasm_bindgen::from_value(data.clone()).map_err(Into::into))
    }
}

/// Per-worker relay state: liveness flag, outbound pending queue, inbound
/// result queue. Owned by exactly one handle; not safe to share without
/// external synchronization.
pub struct RelayCore<M> {
    id: WorkerId,
    alive: bool,
    pending: VecDeque<M>,
    results: Vec<WorkerEvent<M>>,
}

impl<M> RelayCore<M> {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            alive: false,
            pending: VecDeque::new(),
            results: Vec::new(),
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Sends `data` through `send` if the worker is alive, otherwise buffers
    /// it for replay at the liveness transition.
    pub fn post<F>(&mut self, data: M, mut send: F)
    where
        F: FnMut(M),
    {
        if self.alive {
            send(data);
        } else {
            self.pending.push_back(data);
        }
    }

    /// First call flips the worker to alive and replays the pending queue in
    /// enqueue order through `send`. Alive is terminal; repeated calls are
    /// ignored and never re-flush.
    pub fn set_alive<F>(&mut self, mut send: F)
    where
        F: FnMut(M),
    {
        if self.alive {
            return;
        }
        self.alive = true;
        for data in self.pending.drain(..) {
            send(data);
        }
    }

    pub fn push_result(&mut self, data: M) {
        self.results.push(WorkerEvent::Result {
            worker: self.id.clone(),
            data,
        });
    }

    pub fn push_error(&mut self, info: ErrorInfo) {
        self.results.push(WorkerEvent::Error { info });
    }

    /// Removes and returns the whole result queue, oldest first.
    pub fn drain(&mut self) -> Vec<WorkerEvent<M>> {
        mem::take(&mut self.results)
    }
}

impl<M: fmt::Debug> fmt::Debug for RelayCore<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayCore")
            .field("id", &self.id)
            .field("alive", &self.alive)
            .field("pending", &self.pending.len())
            .field("results", &self.results.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> RelayCore<i32> {
        RelayCore::new(WorkerId::generate("prime"))
    }

    #[test]
    fn buffers_until_alive_then_replays_in_order() {
        let mut core = core();
        let mut sent = Vec::new();

        core.post(1, |d| sent.push(d));
        core.post(2, |d| sent.push(d));
        core.post(3, |d| sent.push(d));
        assert!(sent.is_empty());
        assert!(!core.is_alive());

        core.set_alive(|d| sent.push(d));
        assert!(core.is_alive());
        assert_eq!(sent, vec![1, 2, 3]);

        // Once alive, posts go out immediately.
        core.post(4, |d| sent.push(d));
        assert_eq!(sent, vec![1, 2, 3, 4]);
    }

    #[test]
    fn repeated_alive_does_not_reflush() {
        let mut core = core();
        let mut sent = Vec::new();

        core.post(7, |d| sent.push(d));
        core.set_alive(|d| sent.push(d));
        core.set_alive(|d| sent.push(d));
        assert_eq!(sent, vec![7]);
    }

    #[test]
    fn drain_returns_oldest_first_and_empties() {
        let mut core = core();
        core.push_result(10);
        core.push_error(ErrorInfo {
            line: 3,
            message: "boom".to_owned(),
        });
        core.push_result(11);

        let events = core.drain();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].data(), Some(&10));
        assert_eq!(events[1].kind(), msg::ERROR);
        assert_eq!(events[2].data(), Some(&11));

        assert!(core.drain().is_empty());
    }

    #[test]
    fn result_events_carry_the_originating_id() {
        let mut core = core();
        core.push_result(42);

        let events = core.drain();
        assert_eq!(events[0].worker(), Some(core.id()));
        assert_eq!(events[0].kind(), msg::RESULT);
    }

    #[test]
    fn error_events_keep_line_and_message() {
        let mut core = core();
        core.push_error(ErrorInfo {
            line: 12,
            message: "ReferenceError: nope".to_owned(),
        });

        let events = core.drain();
        let info = events[0].error_info().unwrap();
        assert_eq!(info.line, 12);
        assert!(!info.message.is_empty());
    }

    #[test]
    fn ids_share_the_module_prefix_but_differ() {
        let a = WorkerId::generate("prime");
        let b = WorkerId::generate("prime");
        assert_ne!(a, b);

        for id in [&a, &b] {
            let (module, tag) = id.as_str().split_once('@').unwrap();
            assert_eq!(module, "prime");
            assert_eq!(tag.len(), 8);
            assert!(tag.bytes().all(|b| b.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn query_before_alive_reaches_the_worker_once() {
        // Main posts a query before the worker announced readiness, the
        // worker replies with one result.
        let mut core = RelayCore::new(WorkerId::generate("prime"));
        let mut delivered = Vec::new();

        core.post("nextprimes", |q| delivered.push(q));
        assert!(delivered.is_empty());

        core.set_alive(|q| delivered.push(q));
        assert_eq!(delivered, vec!["nextprimes"]);

        core.push_result("prime:101");
        let events = core.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data(), Some(&"prime:101"));
    }
}
