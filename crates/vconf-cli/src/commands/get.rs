use crate::support::{fail, load_repository_or_exit, print_json, record_json, record_line};
use vconf_kernel::Address;

pub fn run(address: String, models: String, snapshot: Option<String>, json_output: bool) {
    let repository = load_repository_or_exit(&models, snapshot.as_deref());
    let parsed: Address = address.parse().unwrap_or_else(|e| fail(e));
    let registry_name = parsed
        .registry
        .clone()
        .unwrap_or_else(|| fail(format!("address '{address}' names no registry")));
    let registry = repository.registry(&registry_name).unwrap_or_else(|e| fail(e));
    let record = repository.find_address(&parsed).unwrap_or_else(|e| fail(e));

    if json_output {
        print_json(&record_json(registry, record));
    } else {
        println!("vconf get {address}");
        println!("  {}", record_line(registry, record));
        if let Some(controller) = record.controller().and_then(|id| registry.get(id)) {
            println!("  Controlled by: {}", controller.path());
        }
        if let Some(variant) = record.selected_variant() {
            println!("  Selects: {variant}");
        }
    }
}
