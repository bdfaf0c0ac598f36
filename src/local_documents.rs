use crate::{
    backend::{available_times_path, segments, DocumentStore},
    error::{Result, ScheduleError},
    types::TimeSlot,
};
use async_trait::async_trait;
use chrono::{Duration, Local};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// In-memory JSON document tree addressed by `/`-separated paths.
#[derive(Debug, Clone, Default)]
pub struct LocalDocuments {
    root: Arc<Mutex<Value>>,
}

impl LocalDocuments {
    pub fn new(root: Value) -> Self {
        Self {
            root: Arc::new(Mutex::new(root)),
        }
    }

    pub fn snapshot(&self) -> Value {
        self.root.lock().unwrap().clone()
    }

    /// Seeds half-hourly slots from 09:00 to 16:30 for the next `days` days
    /// and a pending booking on the first of them.
    pub fn insert_example_schedule(&self, days: i64) -> Result<()> {
        let slots: Vec<TimeSlot> = (9..17)
            .flat_map(|hour| [format!("{hour:02}:00"), format!("{hour:02}:30")])
            .map(|time| TimeSlot::new(time, true))
            .collect();
        let slots = serde_json::to_value(slots)?;
        let mut root = self.root.lock().unwrap();

        for i in 1..=days {
            let date = (Local::now() + Duration::days(i))
                .format("%Y-%m-%d")
                .to_string();
            write(&mut root, &available_times_path(&date), slots.clone())?;

            if i == 1 {
                let booking = json!({
                    "date": date,
                    "time": "10:00 AM",
                    "name": "Example Patient",
                    "phone": "+1 555 0100",
                    "status": "pending",
                });
                write(&mut root, &format!("/bookings/{}", generate_key()), booking)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for LocalDocuments {
    async fn get(&self, path: &str) -> Result<Value> {
        let root = self.root.lock().unwrap();
        Ok(lookup(&root, &segments(path)).cloned().unwrap_or(Value::Null))
    }

    async fn put(&self, path: &str, body: Value) -> Result<()> {
        debug!(path, "put document");
        write(&mut self.root.lock().unwrap(), path, body)
    }

    async fn patch(&self, path: &str, body: Value) -> Result<()> {
        let Value::Object(fields) = body else {
            return Err(ScheduleError::Validation(format!(
                "patch body for {path} must be an object"
            )));
        };
        let mut root = self.root.lock().unwrap();
        for (key, value) in fields {
            write(&mut root, &format!("{path}/{key}"), value)?;
        }
        Ok(())
    }

    async fn post(&self, path: &str, body: Value) -> Result<String> {
        let key = generate_key();
        write(&mut self.root.lock().unwrap(), &format!("{path}/{key}"), body)?;
        Ok(key)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        remove(&mut self.root.lock().unwrap(), &segments(path));
        Ok(())
    }
}

/// Time-ordered keys, so appended records list in creation order.
fn generate_key() -> String {
    Uuid::now_v7().simple().to_string()
}

fn write(root: &mut Value, path: &str, body: Value) -> Result<()> {
    let segments = segments(path);
    if body.is_null() {
        remove(root, &segments);
        return Ok(());
    }
    let mut current = root;
    for segment in segments {
        current = child_mut(current, segment)?;
    }
    *current = body;
    Ok(())
}

fn lookup<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |value, segment| match value {
            Value::Object(map) => map.get(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|value| !is_empty_document(value))
}

/// Removing the last child leaves an empty object behind; it reads as absent.
fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Result<&'a mut Value> {
    match value {
        Value::Object(map) => Ok(map.entry(segment.to_string()).or_insert(Value::Null)),
        Value::Array(items) => {
            let index = segment.parse::<usize>().map_err(|_| {
                ScheduleError::Validation(format!("'{segment}' does not index a list"))
            })?;
            if index == items.len() {
                items.push(Value::Null);
            }
            items.get_mut(index).ok_or_else(|| {
                ScheduleError::Validation(format!("list index {index} out of range"))
            })
        }
        other => {
            *other = Value::Object(Map::new());
            child_mut(other, segment)
        }
    }
}

fn remove(root: &mut Value, segments: &[&str]) {
    let Some((last, parents)) = segments.split_last() else {
        *root = Value::Null;
        return;
    };
    let mut current = root;
    for segment in parents {
        let next = match current {
            Value::Object(map) => map.get_mut(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return,
        }
    }
    match current {
        Value::Object(map) => {
            map.remove(*last);
        }
        Value::Array(items) => {
            if let Some(item) = last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *item = Value::Null;
            }
        }
        _ => {}
    }
}
