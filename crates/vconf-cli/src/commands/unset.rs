use crate::support::{
    fail, load_repository_or_exit, print_json, record_json, record_line, save_snapshot_or_exit,
};
use vconf_kernel::Address;

pub fn run(address: String, models: String, snapshot: Option<String>, json_output: bool) {
    let mut repository = load_repository_or_exit(&models, snapshot.as_deref());
    let parsed: Address = address.parse().unwrap_or_else(|e| fail(e));
    repository
        .unset_value(&address)
        .unwrap_or_else(|e| fail(format!("unset {address}: {e}")));
    if let Some(snapshot) = &snapshot {
        save_snapshot_or_exit(&repository, snapshot);
    }

    let registry_name = parsed.registry.clone().unwrap_or_default();
    let registry = repository.registry(&registry_name).unwrap_or_else(|e| fail(e));
    let record = repository.find_address(&parsed).unwrap_or_else(|e| fail(e));

    if json_output {
        print_json(&record_json(registry, record));
    } else {
        println!("vconf unset {address}");
        println!("  {}", record_line(registry, record));
    }
}
