use smx_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigMode, UnusedKeyPolicy};

const FULL: &str = r#"
snapshot:
  url: "https://example.invalid/deals.json.zst"
lotus:
  rpc_url: "https://api.node.glif.io/"
datacap:
  url: "https://example.invalid/clients"
reconcile:
  proposal_max_age_days: 30
"#;

#[test]
fn reconcile_consumes_every_section() {
    let loaded = load_layered_yaml_from_strings(&[FULL]).unwrap();
    let report =
        report_unused_keys(ConfigMode::Reconcile, &loaded.config_json, UnusedKeyPolicy::Fail)
            .unwrap();
    assert!(report.is_clean(), "{:?}", report.unused_leaf_pointers);
}

#[test]
fn client_sync_reports_other_sections_in_order() {
    let loaded = load_layered_yaml_from_strings(&[FULL]).unwrap();
    let report =
        report_unused_keys(ConfigMode::ClientSync, &loaded.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/lotus/rpc_url".to_string(),
            "/reconcile/proposal_max_age_days".to_string(),
            "/snapshot/url".to_string(),
        ]
    );
    assert_eq!(report.mode, "CLIENT_SYNC");
}

#[test]
fn fail_policy_errors_on_stray_keys() {
    let yaml = "lotus:\n  rpc_url: \"http://x\"\nleftover:\n  foo: 1\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = report_unused_keys(ConfigMode::Resolve, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    let msg = format!("{err:?}");
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "{msg}");
    assert!(msg.contains("/leftover/foo"), "{msg}");
}
