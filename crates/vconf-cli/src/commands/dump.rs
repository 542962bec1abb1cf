use crate::support::{load_repository_or_exit, print_json, record_json, record_line};
use serde_json::json;

pub fn run(models: String, snapshot: Option<String>, json_output: bool) {
    let repository = load_repository_or_exit(&models, snapshot.as_deref());

    if json_output {
        let registries: Vec<_> = repository
            .registries()
            .map(|registry| {
                let rank = repository.rank_of(registry.name()).ok().flatten();
                let records: Vec<_> = registry
                    .traverse()
                    .into_iter()
                    .map(|record| record_json(registry, record))
                    .collect();
                json!({
                    "name": registry.name(),
                    "rank": rank,
                    "records": records,
                })
            })
            .collect();
        let payload = json!({
            "models": models,
            "accomplished": repository.is_accomplished(),
            "registries": registries,
            "dependencies": repository.dependencies(),
            "logic": repository.dependency_logics(),
        });
        print_json(&payload);
    } else {
        println!("vconf dump");
        println!("  Models: {models}");
        println!(
            "  Accomplished: {}",
            if repository.is_accomplished() { "yes" } else { "no" }
        );
        for registry in repository.registries() {
            for record in registry.traverse() {
                println!("  {}", record_line(registry, record));
            }
        }
        for dependency in repository.dependencies() {
            println!("  Dependency: {} -> {}", dependency.depender, dependency.dependee);
        }
        for logic in repository.dependency_logics() {
            println!("  Logic: {} = {}", logic.depender, logic.logic);
        }
    }
}
