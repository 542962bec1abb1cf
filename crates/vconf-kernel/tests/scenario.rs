//! Integration tests: the fast/accurate mode scenario on a standalone
//! registry.
//!
//! The model is written twice, once with the builders and once as a TOML
//! fixture in tests/fixtures/, and both must describe the same tree.

use std::path::PathBuf;
use std::sync::Arc;
use vconf_kernel::{
    Domain, ParameterModel, Record, Registry, Slot, Value, ValueKind, VariantError, VariantModel,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn scenario_model(modes: &[&str]) -> Arc<VariantModel> {
    let mode = ParameterModel::enumeration("mode", modes.iter().copied())
        .with_default("fast")
        .associate("fast", "fastCfg")
        .associate("accurate", "accurateCfg");
    let iterations = ParameterModel::new("iterations", ValueKind::Integer)
        .with_domain(Domain::integer_range(Some(1), None))
        .with_default(10);
    let tolerance = ParameterModel::new("tolerance", ValueKind::Real)
        .with_domain(Domain::RealRange {
            min: Some(0.0),
            max: None,
            min_inclusive: false,
            max_inclusive: true,
        })
        .with_default(1e-6);
    let fast = VariantModel::new("fast").with_parameter("iterations", Arc::new(iterations));
    let accurate = VariantModel::new("accurate").with_parameter("tolerance", Arc::new(tolerance));
    Arc::new(
        VariantModel::new("root")
            .with_slot(Slot::parameter("mode", Arc::new(mode)).ranked(0))
            .with_variant("fastCfg", Arc::new(fast))
            .with_variant("accurateCfg", Arc::new(accurate)),
    )
}

fn registry() -> Registry {
    Registry::build("sim", scenario_model(&["fast", "accurate"])).expect("scenario builds")
}

fn active(registry: &Registry, path: &str) -> bool {
    registry.is_active(path).expect("path exists")
}

/// Full-tree scan of the activation invariants.
fn assert_consistent(registry: &Registry) {
    for record in registry.records() {
        let selected = record
            .controlled_variants()
            .iter()
            .filter(|id| registry.get(**id).is_some_and(Record::is_active))
            .count();
        assert!(
            selected <= 1,
            "{} has {selected} active variants",
            record.path()
        );
        if let Some(parent) = record.parent() {
            let parent = registry.get(parent).expect("parent exists");
            assert!(
                parent.is_active() || !record.is_active(),
                "{} is active under inactive {}",
                record.path(),
                parent.path()
            );
        }
    }
}

type State = Vec<(String, bool, Option<Value>)>;

fn state(registry: &Registry) -> State {
    registry
        .records()
        .map(|r| (r.path().to_string(), r.is_active(), r.explicit_value().cloned()))
        .collect()
}

#[test]
fn fixture_model_matches_builders() {
    let path = fixtures_dir().join("scenario.toml");
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    let model: VariantModel = toml::from_str(&text)
        .unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()));
    assert_eq!(model, *scenario_model(&["fast", "accurate"]));
}

#[test]
fn initial_state_selects_default_variant() {
    let registry = registry();
    assert_eq!(registry.value("root/mode"), Ok(Value::from("fast")));
    assert!(active(&registry, "root"));
    assert!(active(&registry, "root/fastCfg"));
    assert!(active(&registry, "root/fastCfg/iterations"));
    assert!(!active(&registry, "root/accurateCfg"));
    assert!(!active(&registry, "root/accurateCfg/tolerance"));
    assert_eq!(registry.value("root/fastCfg/iterations"), Ok(Value::Integer(10)));
    assert_consistent(&registry);
}

#[test]
fn switching_mode_swaps_variants_and_keeps_values() {
    let mut registry = registry();
    registry.set_value("root/mode", "accurate").expect("valid mode");

    assert!(active(&registry, "root/accurateCfg"));
    assert!(active(&registry, "root/accurateCfg/tolerance"));
    assert!(!active(&registry, "root/fastCfg"));
    assert!(!active(&registry, "root/fastCfg/iterations"));
    assert_eq!(registry.value("root/fastCfg/iterations"), Ok(Value::Integer(10)));
    assert_consistent(&registry);
}

#[test]
fn sticky_reactivation_keeps_nested_values() {
    let mut registry = registry();
    registry.set_value("root/fastCfg/iterations", 42).expect("in range");
    registry.set_value("root/mode", "accurate").expect("valid mode");
    assert!(!active(&registry, "root/fastCfg/iterations"));
    registry.set_value("root/mode", "fast").expect("valid mode");

    assert!(active(&registry, "root/fastCfg/iterations"));
    assert_eq!(registry.value("root/fastCfg/iterations"), Ok(Value::Integer(42)));
}

#[test]
fn exclusivity_holds_after_every_assignment() {
    let mut registry = registry();
    let steps: [(&str, Value); 6] = [
        ("root/mode", Value::from("accurate")),
        ("root/accurateCfg/tolerance", Value::Real(0.5)),
        ("root/mode", Value::from("fast")),
        ("root/fastCfg/iterations", Value::Integer(3)),
        ("root/mode", Value::from("fast")),
        ("root/mode", Value::from("accurate")),
    ];
    for (path, value) in steps {
        registry.set_value(path, value).expect("valid assignment");
        assert_consistent(&registry);
    }
}

#[test]
fn validation_gate_leaves_state_untouched() {
    let mut registry = registry();
    let before = state(&registry);

    let err = registry.set_value("root/mode", "slow").expect_err("outside enum");
    assert!(matches!(err, VariantError::InvalidValue { ref path, .. } if path == "root/mode"));
    let err = registry
        .set_value("root/fastCfg/iterations", 0)
        .expect_err("below range");
    assert!(matches!(err, VariantError::InvalidValue { .. }));
    let err = registry
        .set_value_from_str("root/fastCfg/iterations", "many")
        .expect_err("not an integer");
    assert!(matches!(err, VariantError::InvalidValue { .. }));

    assert_eq!(state(&registry), before);
    assert!(registry.find("root/mode").expect("exists").is_value_set());
}

#[test]
fn inactive_records_reject_writes() {
    let mut registry = registry();
    let err = registry
        .set_value("root/accurateCfg/tolerance", 0.1)
        .expect_err("branch inactive");
    assert_eq!(
        err,
        VariantError::InvalidValue {
            path: "root/accurateCfg/tolerance".to_string(),
            reason: "record is not active".to_string(),
        }
    );
}

#[test]
fn unset_falls_back_to_default() {
    let mut registry = registry();
    registry.set_value("root/fastCfg/iterations", 5).expect("in range");
    registry.unset_value("root/fastCfg/iterations").expect("unset");
    let record = registry.find("root/fastCfg/iterations").expect("exists");
    assert!(!record.is_value_set());
    assert_eq!(record.value(), Ok(Value::Integer(10)));
}

#[test]
fn text_values_follow_parameter_kind() {
    let mut registry = registry();
    registry
        .set_value_from_str("root/mode", "\"accurate\"")
        .expect("quoted string");
    registry
        .set_value_from_str("root/accurateCfg/tolerance", "2.5e-3")
        .expect("real");
    assert_eq!(
        registry.value("root/accurateCfg/tolerance"),
        Ok(Value::Real(0.0025))
    );
}

#[test]
fn snapshot_lists_active_explicit_values_in_presentation_order() {
    let mut registry = registry();
    insta::assert_snapshot!(registry.snapshot(), @r#"
    root/mode = "fast"
    root/fastCfg/iterations = 10
    "#);

    registry.set_value("root/mode", "accurate").expect("valid mode");
    insta::assert_snapshot!(registry.snapshot(), @r#"
    root/mode = "accurate"
    root/accurateCfg/tolerance = 0.000001
    "#);
}

#[test]
fn restore_of_own_snapshot_is_idempotent() {
    let mut registry = registry();
    registry.set_value("root/fastCfg/iterations", 7).expect("in range");
    registry.set_value("root/mode", "accurate").expect("valid mode");
    registry
        .set_value("root/accurateCfg/tolerance", 0.25)
        .expect("in range");
    let before = state(&registry);
    let text = registry.snapshot();

    registry.restore(&text).expect("own snapshot restores");

    assert_eq!(state(&registry), before);
    assert_eq!(registry.snapshot(), text);
}

#[test]
fn restore_skips_unknown_paths_and_accepts_any_line_order() {
    let mut registry = registry();
    let text = "# saved by an older model\n\
                root/accurateCfg/tolerance = 0.5\n\
                root/retired = 3\n\
                \n\
                root/mode = \"accurate\"\n";
    registry.restore(text).expect("restores");
    assert_eq!(registry.value("root/mode"), Ok(Value::from("accurate")));
    assert_eq!(
        registry.value("root/accurateCfg/tolerance"),
        Ok(Value::Real(0.5))
    );
}

#[test]
fn failed_restore_changes_nothing() {
    let mut registry = registry();
    let before = state(&registry);
    let text = "root/mode = \"accurate\"\nroot/accurateCfg/tolerance = -1\n";
    let err = registry.restore(text).expect_err("negative tolerance");
    assert!(matches!(err, VariantError::InvalidValue { .. }));
    assert_eq!(state(&registry), before);
}

#[test]
fn restore_into_narrowed_domain_is_rejected() {
    let mut original = registry();
    original.set_value("root/mode", "accurate").expect("valid mode");
    let text = original.snapshot();

    let mut narrowed = Registry::build("sim", scenario_model(&["fast"])).expect("narrowed builds");
    let err = narrowed.restore(&text).expect_err("accurate was removed");
    assert!(matches!(err, VariantError::InvalidValue { ref path, .. } if path == "root/mode"));
    assert_eq!(narrowed.value("root/mode"), Ok(Value::from("fast")));
}

#[test]
fn restore_reports_lines_that_stay_inactive() {
    let mut registry = registry();
    let err = registry
        .restore("root/accurateCfg/tolerance = 0.5\n")
        .expect_err("accurate branch is never selected");
    assert_eq!(
        err,
        VariantError::InvalidValue {
            path: "root/accurateCfg/tolerance".to_string(),
            reason: "record is not active".to_string(),
        }
    );
}

#[test]
fn dangling_association_fails_the_build() {
    let mode = ParameterModel::enumeration("mode", ["fast"]).associate("fast", "missing");
    let top = VariantModel::new("root").with_parameter("mode", Arc::new(mode));
    let err = Registry::build("sim", Arc::new(top)).expect_err("dangling target");
    assert!(err.is_structural());
    assert!(matches!(err, VariantError::DanglingAssociation { ref variant, .. } if variant == "missing"));
}

fn settings_registry() -> Registry {
    let top = VariantModel::new("root")
        .with_parameter(
            "label",
            Arc::new(ParameterModel::new("label", ValueKind::String).with_default("run")),
        )
        .with_parameter(
            "gain",
            Arc::new(ParameterModel::new("gain", ValueKind::Real).with_default(1.0)),
        )
        .with_parameter(
            "version",
            Arc::new(ParameterModel::new("version", ValueKind::Integer).with_fixed(2)),
        );
    Registry::build("settings", Arc::new(top)).expect("settings build")
}

#[test]
fn non_finite_reals_are_rejected() {
    let mut registry = settings_registry();
    let before = state(&registry);
    for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        let err = registry.set_value("root/gain", value).expect_err("not finite");
        assert!(matches!(err, VariantError::InvalidValue { ref path, .. } if path == "root/gain"));
    }
    for text in ["inf", "-inf", "NaN"] {
        let err = registry
            .set_value_from_str("root/gain", text)
            .expect_err("not finite");
        assert!(matches!(err, VariantError::InvalidValue { .. }));
    }
    assert_eq!(state(&registry), before);
    assert_eq!(registry.value("root/gain"), Ok(Value::Real(1.0)));
}

#[test]
fn strings_with_control_characters_survive_snapshot_and_restore() {
    let mut registry = settings_registry();
    registry
        .set_value("root/label", "first\nsecond\tthird\r")
        .expect("any string");
    let text = registry.snapshot();
    assert_eq!(text.lines().count(), 2, "one line per value: {text:?}");
    assert!(text.contains(r#"root/label = "first\nsecond\tthird\r""#));

    let mut fresh = settings_registry();
    fresh.restore(&text).expect("own snapshot restores");
    assert_eq!(
        fresh.value("root/label"),
        Ok(Value::from("first\nsecond\tthird\r"))
    );
    assert_eq!(fresh.snapshot(), text);
}

#[test]
fn unsetting_a_fixed_parameter_keeps_its_value() {
    let mut registry = settings_registry();
    registry.unset_value("root/version").expect("unset");
    assert_eq!(registry.value("root/version"), Ok(Value::Integer(2)));
    assert!(registry.is_accomplished());
    assert!(registry.unset_parameters().is_empty());

    registry.set_fixed_value("root/version").expect("fixed value");
    assert_eq!(registry.value("root/version"), Ok(Value::Integer(2)));
}
