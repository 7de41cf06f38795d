// Logging utilities
// Structured logging with JSON and human-readable formats

use log::Level;
use serde_json::json;

/// Parse phase and step from log message
/// Extracts [PHASE: ...] and [STEP: ...] patterns
pub fn parse_log_metadata(message: &str) -> (Option<String>, Option<String>, String) {
    let mut phase = None;
    let mut step = None;
    let mut cleaned_message = message.to_string();

    if let Some((value, rest)) = extract_tag(&cleaned_message, "[PHASE:") {
        phase = Some(value);
        cleaned_message = rest;
    }

    if let Some((value, rest)) = extract_tag(&cleaned_message, "[STEP:") {
        step = Some(value);
        cleaned_message = rest;
    }

    (phase, step, cleaned_message)
}

fn extract_tag(message: &str, open: &str) -> Option<(String, String)> {
    let start = message.find(open)?;
    let end = start + message[start..].find(']')?;
    let value = message[start + open.len()..end].trim().to_string();
    let rest = format!("{} {}", &message[..start], &message[end + 1..])
        .trim()
        .to_string();
    Some((value, rest))
}

/// Format log entry as JSON for structured logging
pub fn format_json_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
    session_id: Option<&str>,
) -> String {
    let mut log_entry = json!({
        "timestamp": timestamp,
        "level": level.as_str(),
        "target": target,
        "message": message,
    });

    if let Some(phase) = phase {
        log_entry["phase"] = json!(phase);
    }

    if let Some(step) = step {
        log_entry["step"] = json!(step);
    }

    if let Some(session_id) = session_id {
        log_entry["session"] = json!(session_id);
    }

    serde_json::to_string(&log_entry).unwrap_or_else(|_| "{}".to_string())
}

/// Format log entry as human-readable text
pub fn format_human_readable_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut log_line = format!("[{}] [{}]", timestamp, level.as_str());

    if let Some(phase) = phase {
        log_line.push_str(&format!(" [PHASE: {}]", phase));
    }

    if let Some(step) = step {
        log_line.push_str(&format!(" [STEP: {}]", step));
    }

    log_line.push_str(&format!(" [{}] {}", target, message));
    log_line
}
