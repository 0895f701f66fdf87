//! CLI output formatting module
//!
//! Commands render either a human-readable view or JSON, chosen by the
//! global `--json` flag.

pub mod table;

use serde::Serialize;

pub use table::{TableFormatter, BEST_RESULT_SUBSET};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.to_json()).unwrap_or_default()
        );
    } else {
        println!("{}", result.to_human());
    }
}
