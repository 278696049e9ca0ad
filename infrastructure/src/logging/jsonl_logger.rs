//! JSONL transcript of everything exchanged with the debugger server.
//!
//! Each [`WireEvent`] becomes one JSON line carrying `seq`, `type` and
//! `timestamp` next to the event payload.

use harness_application::{WireEvent, WireLogger};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Appends wire events to a JSONL file.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Every line is flushed as it is
/// written so a crashed run still leaves a readable transcript.
pub struct JsonlWireLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    seq: AtomicU64,
}

impl JsonlWireLogger {
    /// Create the transcript file, and its parent directories if needed.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            seq: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Merge bookkeeping fields into the payload; non-object payloads go
/// under `data`.
fn record(event: WireEvent, seq: u64, timestamp: String) -> Value {
    let mut map = match event.payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert("seq".to_string(), Value::from(seq));
    map.insert("type".to_string(), Value::from(event.event_type));
    map.insert("timestamp".to_string(), Value::String(timestamp));
    Value::Object(map)
}

impl WireLogger for JsonlWireLogger {
    fn log(&self, event: WireEvent) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let Ok(line) = serde_json::to_string(&record(event, seq, timestamp)) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlWireLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
