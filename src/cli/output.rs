//! Human/JSON output switch for CLI command results.

use serde::Serialize;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Render a `TaskWingError` at the CLI boundary: human mode prints a
/// message (+ hint), JSON mode prints the structured
/// `{ok:false,kind,message,hint}` body.
pub fn output_error(err: &crate::TaskWingError, json_mode: bool) {
    let hint = err.default_hint();
    if json_mode {
        let body = serde_json::json!({
            "ok": false,
            "kind": err.kind(),
            "message": err.to_string(),
            "hint": hint,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("error: {err}");
        if let Some(hint) = hint {
            eprintln!("hint: {hint}");
        }
    }
}
