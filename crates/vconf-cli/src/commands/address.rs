use crate::support::{fail, print_json};
use serde_json::json;
use vconf_kernel::Address;

pub fn run(text: String, json_output: bool) {
    let address: Address = text.parse().unwrap_or_else(|e| fail(e));

    if json_output {
        print_json(&json!({
            "input": text,
            "canonical": address.to_string(),
            "registry": address.registry,
            "path": address.local_path(),
            "segments": address.segments,
            "group": address.group,
        }));
    } else {
        println!("vconf address");
        println!("  Canonical: {address}");
        if let Some(registry) = &address.registry {
            println!("  Registry: {registry}");
        }
        println!("  Path: {}", address.local_path());
        if let Some(group) = &address.group {
            println!("  Group: {group}");
        }
    }
}
