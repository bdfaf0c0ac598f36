use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    backend::DocumentStore,
    error::{Result, ScheduleError},
    local_documents::LocalDocuments,
};

pub struct MockDocumentStoreInner {
    pub success: AtomicBool,
    pub calls_to_get: AtomicU64,
    pub calls_to_put: AtomicU64,
    pub calls_to_patch: AtomicU64,
    pub calls_to_post: AtomicU64,
    pub calls_to_delete: AtomicU64,
    pub put_delay_ms: AtomicU64,
    pub puts: Mutex<Vec<(String, Value)>>,
    pub documents: LocalDocuments,
}

/// Counts calls and forwards them to an in-memory tree unless `success`
/// is switched off.
#[derive(Clone)]
pub struct MockDocumentStore(pub Arc<MockDocumentStoreInner>);

impl MockDocumentStoreInner {
    fn new(documents: LocalDocuments) -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_get: AtomicU64::default(),
            calls_to_put: AtomicU64::default(),
            calls_to_patch: AtomicU64::default(),
            calls_to_post: AtomicU64::default(),
            calls_to_delete: AtomicU64::default(),
            put_delay_ms: AtomicU64::default(),
            puts: Mutex::default(),
            documents,
        }
    }
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::with_documents(Value::Null)
    }

    pub fn with_documents(root: Value) -> Self {
        Self(Arc::new(MockDocumentStoreInner::new(LocalDocuments::new(
            root,
        ))))
    }

    pub fn fail(&self, fail: bool) {
        self.0.success.store(!fail, Ordering::SeqCst);
    }

    /// Every `put` takes `delay` before it lands.
    pub fn slow_puts(&self, delay: Duration) {
        self.0
            .put_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> u64 {
        self.0.calls_to_put.load(Ordering::SeqCst)
    }

    pub fn recorded_puts(&self) -> Vec<(String, Value)> {
        self.0.puts.lock().unwrap().clone()
    }

    fn result(&self) -> Result<()> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(ScheduleError::Transport("Supposed to fail".into())),
        }
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn get(&self, path: &str) -> Result<Value> {
        self.0.calls_to_get.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.documents.get(path).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<()> {
        self.0.calls_to_put.fetch_add(1, Ordering::SeqCst);
        let delay = self.0.put_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.result()?;
        self.0
            .puts
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        self.0.documents.put(path, body).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<()> {
        self.0.calls_to_patch.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.documents.patch(path, body).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<String> {
        self.0.calls_to_post.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.documents.post(path, body).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.0.calls_to_delete.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.documents.delete(path).await
    }
}
