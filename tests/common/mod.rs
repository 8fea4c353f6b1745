#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    body::to_bytes,
    response::Response,
};
use gateway_kit::middleware::{LogRecord, LogSink};
use tracing::Level;

#[derive(Debug, Clone)]
pub struct Entry {
    pub level: Level,
    pub record: LogRecord,
    pub message: String,
}

/// Keeps every emitted record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl MemorySink {
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, level: Level, record: &LogRecord, message: &str) {
        self.entries.lock().unwrap().push(Entry {
            level,
            record: record.clone(),
            message: message.to_string(),
        });
    }
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

