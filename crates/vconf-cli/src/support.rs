use serde::Deserialize;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tracing::debug;
use vconf_kernel::{Dependency, DependencyLogic, Record, Registry, Repository, VariantModel};

/// On-disk repository description.
#[derive(Debug, Deserialize)]
pub struct RepositoryFile {
    #[serde(default)]
    pub registries: Vec<RegistryEntry>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub logic: Vec<DependencyLogic>,
}

#[derive(Debug, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(default)]
    pub rank: Option<u32>,
    pub top: VariantModel,
}

pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn parse_repository_file(path: &Path, text: &str) -> Result<RepositoryFile, String> {
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    if is_toml {
        toml::from_str(text).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }
}

/// Build the repository described by `models`, then restore `snapshot`
/// when that file exists.
pub fn load_repository_or_exit(models: &str, snapshot: Option<&str>) -> Repository {
    let path = Path::new(models);
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        fail(format!("failed to read {}: {e}", path.display()));
    });
    let file = parse_repository_file(path, &text).unwrap_or_else(|e| {
        fail(format!("failed to parse {}: {e}", path.display()));
    });

    let mut repository = Repository::new();
    for entry in file.registries {
        let name = entry.name;
        let registry = Registry::build(name.clone(), std::sync::Arc::new(entry.top))
            .unwrap_or_else(|e| fail(format!("registry '{name}': {e}")));
        repository
            .add_registry(registry, entry.rank)
            .unwrap_or_else(|e| fail(e));
    }
    for dependency in &file.dependencies {
        repository
            .register_dependency(&dependency.depender, &dependency.dependee)
            .unwrap_or_else(|e| {
                fail(format!(
                    "dependency {} -> {}: {e}",
                    dependency.depender, dependency.dependee
                ))
            });
    }
    for entry in &file.logic {
        repository
            .set_dependency_logic(&entry.depender, &entry.logic)
            .unwrap_or_else(|e| fail(format!("logic for {}: {e}", entry.depender)));
    }
    debug!(models = %path.display(), "repository loaded");

    if let Some(snapshot) = snapshot {
        let snapshot_path = Path::new(snapshot);
        if snapshot_path.exists() {
            let text = fs::read_to_string(snapshot_path).unwrap_or_else(|e| {
                fail(format!("failed to read {}: {e}", snapshot_path.display()));
            });
            repository.restore(&text).unwrap_or_else(|e| {
                fail(format!("failed to restore {}: {e}", snapshot_path.display()));
            });
        }
    }
    repository
}

pub fn save_snapshot_or_exit(repository: &Repository, snapshot: &str) {
    fs::write(snapshot, repository.snapshot()).unwrap_or_else(|e| {
        fail(format!("failed to write {snapshot}: {e}"));
    });
}

pub fn print_json(payload: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(payload).expect("json serialization")
    );
}

pub fn address_of(registry: &Registry, record: &Record) -> String {
    format!("{}:{}", registry.name(), record.path())
}

pub fn record_json(registry: &Registry, record: &Record) -> Value {
    let value = record.effective_value().map(|v| json!(v));
    json!({
        "address": address_of(registry, record),
        "kind": record.kind().as_str(),
        "active": record.is_active(),
        "value": value,
        "valueSet": record.is_value_set(),
        "fixed": record.is_fixed(),
        "rank": record.rank(),
    })
}

/// `registry:path (kind, active) = value`
pub fn record_line(registry: &Registry, record: &Record) -> String {
    let state = if record.is_active() { "active" } else { "inactive" };
    let mut line = format!(
        "{} ({}, {state})",
        address_of(registry, record),
        record.kind().as_str()
    );
    if record.is_parameter() {
        match record.effective_value() {
            Some(value) => line.push_str(&format!(" = {value}")),
            None => line.push_str(" = <unset>"),
        }
    }
    line
}
