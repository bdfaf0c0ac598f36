use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub const AVAILABLE_TIMES: &str = "/available_times";
pub const BOOKINGS: &str = "/bookings";

/// Path-addressed JSON-document store. `get` of a missing path yields
/// `Value::Null`; `post` appends under a generated key and returns it.
#[async_trait]
pub trait DocumentStore: Clone + Send + Sync + 'static {
    async fn get(&self, path: &str) -> Result<Value>;
    async fn put(&self, path: &str, body: Value) -> Result<()>;
    async fn patch(&self, path: &str, body: Value) -> Result<()>;
    async fn post(&self, path: &str, body: Value) -> Result<String>;
    async fn delete(&self, path: &str) -> Result<()>;
}

pub fn available_times_path(date: &str) -> String {
    format!("{AVAILABLE_TIMES}/{date}")
}

pub fn booking_path(id: &str) -> String {
    format!("{BOOKINGS}/{id}")
}

/// Splits a document path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}
