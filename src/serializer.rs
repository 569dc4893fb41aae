//! Named FIFO work queues with a single consumer each.
//!
//! Every serializer owns one worker task; work pushed onto a serializer runs
//! sequentially in push order. The registry tracks live serializers by name
//! and folds their per-queue overload state into a single process-wide
//! alert predicate.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};

type SerializedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

tokio::task_local! {
    static CURRENT_SERIALIZER: String;
}

/// Name of the serializer driving the current task, if the caller runs on
/// one at all.
pub fn current_serializer_name() -> Option<String> {
    CURRENT_SERIALIZER.try_with(|name| name.clone()).ok()
}

/// Registry of live serializers, looked up by name.
pub struct SerializerRegistry {
    names: Mutex<HashMap<String, Weak<SerializerInner>>>,
    alert_count: AtomicUsize,
    name_seq: AtomicU64,
    high_water: usize,
    low_water: usize,
}

impl SerializerRegistry {
    pub fn new(high_water: usize, low_water: usize) -> Arc<Self> {
        Arc::new(Self {
            names: Mutex::new(HashMap::new()),
            alert_count: AtomicUsize::new(0),
            name_seq: AtomicU64::new(1),
            high_water,
            low_water,
        })
    }

    /// True while at least one serializer sits above its high-water mark.
    pub fn overload_alert(&self) -> bool {
        self.alert_count.load(Ordering::SeqCst) > 0
    }

    /// Derive a unique serializer name from a base.
    pub fn build_name(&self, base: &str) -> String {
        let seq = self.name_seq.fetch_add(1, Ordering::Relaxed);
        format!("{base}-{seq:08x}")
    }

    /// Create a serializer under `name` and start its worker. Fails while a
    /// live serializer already carries that name.
    pub fn create(self: &Arc<Self>, name: &str) -> Result<Serializer> {
        let shared = Arc::new(WorkerShared {
            name: name.to_string(),
            registry: Arc::downgrade(self),
            depth: AtomicUsize::new(0),
            alerting: AtomicBool::new(false),
            high_water: self.high_water,
            low_water: self.low_water,
        });
        let (queue, backlog) = mpsc::unbounded_channel();
        let inner = Arc::new(SerializerInner {
            shared: shared.clone(),
            queue: Mutex::new(Some(queue)),
            worker: Mutex::new(None),
        });

        {
            let mut names = self.names.lock().unwrap();
            let taken = names
                .get(name)
                .map(|existing| existing.strong_count() > 0)
                .unwrap_or(false);
            if taken {
                drop(names);
                return Err(Error::SerializerExists(name.to_string()));
            }
            names.insert(name.to_string(), Arc::downgrade(&inner));
        }

        let worker = tokio::spawn(run_worker(shared, backlog));
        *inner.worker.lock().unwrap() = Some(worker);
        debug!(serializer = %name, "serializer created");
        Ok(Serializer { inner })
    }

    /// Look up a live serializer, bumping its reference.
    pub fn get(&self, name: &str) -> Option<Serializer> {
        let names = self.names.lock().unwrap();
        names
            .get(name)
            .and_then(Weak::upgrade)
            .map(|inner| Serializer { inner })
    }

    fn forget(&self, name: &str) {
        let mut names = self.names.lock().unwrap();
        if let Some(weak) = names.get(name) {
            if weak.strong_count() == 0 {
                names.remove(name);
            }
        }
    }
}

/// Named FIFO work queue. Clones share the queue; `shutdown` closes it and
/// waits for the worker to drain everything already pushed.
#[derive(Clone)]
pub struct Serializer {
    inner: Arc<SerializerInner>,
}

struct SerializerInner {
    shared: Arc<WorkerShared>,
    queue: Mutex<Option<mpsc::UnboundedSender<SerializedTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct WorkerShared {
    name: String,
    registry: Weak<SerializerRegistry>,
    depth: AtomicUsize,
    alerting: AtomicBool,
    high_water: usize,
    low_water: usize,
}

impl Serializer {
    pub fn name(&self) -> &str {
        &self.inner.shared.name
    }

    /// Number of tasks pushed but not yet completed.
    pub fn depth(&self) -> usize {
        self.inner.shared.depth.load(Ordering::SeqCst)
    }

    /// Queue a task. Tasks run to completion in push order on the worker.
    pub fn push<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let queue = self.inner.queue.lock().unwrap();
        let Some(sender) = queue.as_ref() else {
            return Err(Error::SerializerClosed(self.name().to_string()));
        };
        self.inner.shared.note_queued();
        if sender.send(Box::pin(task)).is_err() {
            self.inner.shared.note_done();
            return Err(Error::SerializerClosed(self.name().to_string()));
        }
        Ok(())
    }

    /// Close the queue, drop the name mapping, and wait for the worker to
    /// finish every task already queued.
    pub async fn shutdown(&self) {
        if let Some(registry) = self.inner.shared.registry.upgrade() {
            let mut names = registry.names.lock().unwrap();
            names.remove(&self.inner.shared.name);
        }
        self.inner.queue.lock().unwrap().take();
        let worker = self.inner.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

impl Drop for SerializerInner {
    fn drop(&mut self) {
        if let Some(registry) = self.shared.registry.upgrade() {
            registry.forget(&self.shared.name);
        }
    }
}

impl WorkerShared {
    fn note_queued(&self) {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if depth >= self.high_water && !self.alerting.swap(true, Ordering::SeqCst) {
            if let Some(registry) = self.registry.upgrade() {
                registry.alert_count.fetch_add(1, Ordering::SeqCst);
            }
            warn!(serializer = %self.name, depth, "serializer above high-water mark");
        }
    }

    fn note_done(&self) {
        let depth = self.depth.fetch_sub(1, Ordering::SeqCst) - 1;
        if depth <= self.low_water {
            self.clear_alert();
        }
    }

    fn clear_alert(&self) {
        if self.alerting.swap(false, Ordering::SeqCst) {
            if let Some(registry) = self.registry.upgrade() {
                registry.alert_count.fetch_sub(1, Ordering::SeqCst);
            }
            debug!(serializer = %self.name, "serializer back below low-water mark");
        }
    }
}

impl Drop for WorkerShared {
    fn drop(&mut self) {
        self.clear_alert();
    }
}

async fn run_worker(
    shared: Arc<WorkerShared>,
    mut backlog: mpsc::UnboundedReceiver<SerializedTask>,
) {
    while let Some(task) = backlog.recv().await {
        CURRENT_SERIALIZER.scope(shared.name.clone(), task).await;
        shared.note_done();
    }
    debug!(serializer = %shared.name, "serializer drained");
}
