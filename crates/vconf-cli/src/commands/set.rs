use crate::support::{
    fail, load_repository_or_exit, print_json, record_json, record_line, save_snapshot_or_exit,
};
use vconf_kernel::Address;

pub fn run(
    address: String,
    value: String,
    models: String,
    snapshot: Option<String>,
    json_output: bool,
) {
    let mut repository = load_repository_or_exit(&models, snapshot.as_deref());
    let parsed: Address = address.parse().unwrap_or_else(|e| fail(e));
    repository
        .set_value_from_str(&address, &value)
        .unwrap_or_else(|e| fail(format!("set {address}: {e}")));
    if let Some(snapshot) = &snapshot {
        save_snapshot_or_exit(&repository, snapshot);
    }

    let registry_name = parsed.registry.clone().unwrap_or_default();
    let registry = repository.registry(&registry_name).unwrap_or_else(|e| fail(e));
    let record = repository.find_address(&parsed).unwrap_or_else(|e| fail(e));
    let unset = repository.unset_parameters();

    if json_output {
        let mut payload = record_json(registry, record);
        payload["snapshot"] = serde_json::json!(snapshot);
        payload["unsetParameters"] = serde_json::json!(unset);
        print_json(&payload);
    } else {
        println!("vconf set {address}");
        println!("  {}", record_line(registry, record));
        if let Some(snapshot) = &snapshot {
            println!("  Snapshot: {snapshot}");
        }
        if !unset.is_empty() {
            println!("  Unset parameters: {}", unset.join(", "));
        }
    }
}
