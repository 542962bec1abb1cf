use crate::support::{load_repository_or_exit, print_json};
use serde_json::json;

pub fn run(models: String, snapshot: Option<String>, json_output: bool) {
    let repository = load_repository_or_exit(&models, snapshot.as_deref());
    let text = repository.snapshot();

    if json_output {
        let lines: Vec<&str> = text.lines().collect();
        print_json(&json!({
            "models": models,
            "snapshot": snapshot,
            "lines": lines,
        }));
    } else {
        print!("{text}");
    }
}
