use crate::support::{fail, load_repository_or_exit, print_json};
use serde_json::json;

pub fn run(
    depender: String,
    dependee: String,
    logic: Option<String>,
    models: String,
    snapshot: Option<String>,
    json_output: bool,
) {
    let mut repository = load_repository_or_exit(&models, snapshot.as_deref());
    repository
        .register_dependency(&depender, &dependee)
        .unwrap_or_else(|e| fail(format!("dependency {depender} -> {dependee}: {e}")));
    if let Some(logic) = &logic {
        repository
            .set_dependency_logic(&depender, logic)
            .unwrap_or_else(|e| fail(e));
    }
    let active = repository
        .is_active(depender.split('@').next().unwrap_or(&depender))
        .unwrap_or_else(|e| fail(e));

    if json_output {
        print_json(&json!({
            "depender": depender,
            "dependee": dependee,
            "dependerActive": active,
            "dependencies": repository.dependencies(),
            "logic": repository.dependency_logics(),
        }));
    } else {
        println!("vconf depend {depender} -> {dependee}");
        println!("  Depender active: {}", if active { "yes" } else { "no" });
        println!("  Registered: {}", repository.dependencies().len());
        if let Some(logic) = &logic {
            println!("  Logic: {logic}");
        }
    }
}
