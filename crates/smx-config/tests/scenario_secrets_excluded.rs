use smx_config::load_layered_yaml_from_strings;
use smx_config::secrets::resolve_secrets;

#[test]
fn literal_jwt_token_rejected() {
    let yaml = r#"
lotus:
  rpc_url: "https://api.node.glif.io/"
  token_env: "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.payload.sig"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err().to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"), "got: {err}");
    assert!(err.contains("/lotus/token_env"), "got: {err}");
    assert!(!err.contains("eyJhbGci"), "error must not echo the value: {err}");
}

#[test]
fn secret_in_overlay_rejected() {
    let base = "lotus:\n  token_env: \"SMX_LOTUS_TOKEN\"\n";
    let overlay = "datacap:\n  url: \"sk-live-sneaky-override\"\n";
    let err = load_layered_yaml_from_strings(&[base, overlay])
        .unwrap_err()
        .to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"), "got: {err}");
}

#[test]
fn no_token_env_means_anonymous() {
    let cfg = load_layered_yaml_from_strings(&["lotus:\n  rpc_url: \"http://localhost:1234/rpc/v1\"\n"])
        .unwrap()
        .config_json;
    let secrets = resolve_secrets(&cfg).unwrap();
    assert!(secrets.lotus_token.is_none());
}

#[test]
fn configured_but_unset_token_env_fails_with_name() {
    // Sentinel name that is never set anywhere.
    let cfg = load_layered_yaml_from_strings(&[
        "lotus:\n  token_env: \"SMX_SENTINEL_LOTUS_TOKEN_UNSET_Q7\"\n",
    ])
    .unwrap()
    .config_json;
    let msg = resolve_secrets(&cfg).unwrap_err().to_string();
    assert!(msg.contains("SECRETS_MISSING"), "{msg}");
    assert!(msg.contains("SMX_SENTINEL_LOTUS_TOKEN_UNSET_Q7"), "{msg}");
}

#[test]
fn debug_output_is_redacted() {
    let secrets = smx_config::secrets::ResolvedSecrets {
        lotus_token: Some("super-secret-value".to_string()),
    };
    let dbg = format!("{secrets:?}");
    assert!(dbg.contains("REDACTED"), "{dbg}");
    assert!(!dbg.contains("super-secret-value"), "{dbg}");
}
