//! Opt-in JSON-lines event log for network traffic
//!
//! Events are appended to the file named by `UR_DEBUG_LOG_PATH`. Nothing is
//! written when the variable is unset.

use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment variable naming the log file
pub const DEBUG_LOG_ENV: &str = "UR_DEBUG_LOG_PATH";

static LOG_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn debug_log_path() -> Option<PathBuf> {
    let path = PathBuf::from(env::var_os(DEBUG_LOG_ENV)?);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    Some(path)
}

fn escape_log_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn format_event(ts: u128, location: &str, message: &str, data: &str) -> String {
    format!(
        r#"{{"id":"ur_{:08x}","timestamp":{},"location":"{}","message":"{}","data":"{}"}}"#,
        ts,
        ts,
        escape_log_value(location),
        escape_log_value(message),
        escape_log_value(data)
    )
}

pub(crate) fn append_event(path: &Path, location: &str, message: &str, data: &str) {
    let _guard = LOG_LOCK.lock().ok();
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let _ = writeln!(file, "{}", format_event(ts, location, message, data));
    }
}

/// Record one event if the debug log is enabled
pub fn log_debug_event(location: &str, message: &str, data: &str) {
    if let Some(path) = debug_log_path() {
        append_event(&path, location, message, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.log");
        append_event(&path, "gateway.rs:fetch", "gateway_fetch", "url=\"x\"\nnext");
        append_event(&path, "rpc.rs:eth_call", "eth_call", "to=0x00");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["message"], "gateway_fetch");
        assert_eq!(first["data"], "url=\"x\"\nnext");
        assert!(first["id"].as_str().unwrap().starts_with("ur_"));
    }
}
