use crate::support::{fail, load_repository_or_exit, print_json, record_json, record_line};
use serde_json::json;
use vconf_kernel::Selector;

pub fn run(selector: String, models: String, snapshot: Option<String>, json_output: bool) {
    let repository = load_repository_or_exit(&models, snapshot.as_deref());
    let parsed: Selector = selector
        .parse()
        .unwrap_or_else(|e| fail(format!("selector '{selector}': {e}")));
    let matches = repository.select(&parsed);

    if json_output {
        let records: Vec<_> = matches
            .iter()
            .map(|(registry, record)| record_json(registry, record))
            .collect();
        print_json(&json!({
            "selector": parsed.to_string(),
            "count": records.len(),
            "records": records,
        }));
    } else {
        println!("vconf select {parsed}");
        println!("  Matches: {}", matches.len());
        for (registry, record) in &matches {
            println!("  {}", record_line(registry, record));
        }
    }
}
