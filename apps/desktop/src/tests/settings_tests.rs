use super::*;
use config::Map;

fn env(vars: &[(&str, &str)]) -> Environment {
    let source: Map<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .source(Some(source))
}

fn temp_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write settings");
    path
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = tempfile::tempdir().expect("temp dir");
    let settings = build_settings(
        Some(&temp_file(&dir, "empty.toml", "")),
        env(&[]),
        &Overrides::default(),
    )
    .expect("settings");
    assert_eq!(settings.contract_url, "http://127.0.0.1:8545/");
    assert_eq!(settings.wallet_key_path, PathBuf::from("./data/wallet.key"));
    assert_eq!(settings.log_filter, "info");
    assert_eq!(settings.simulation_delay_ms, 3000);
    assert_eq!(settings.watch_interval_secs, 5);
}

#[test]
fn file_then_env_then_flags() {
    let dir = tempfile::tempdir().expect("temp dir");
    let file = temp_file(
        &dir,
        "layered.toml",
        "contract_url = \"http://file:1/\"\nlog_filter = \"debug\"\nsimulation_delay_ms = 10\n",
    );

    let settings = build_settings(
        Some(&file),
        env(&[("HERITAGE__CONTRACT_URL", "http://env:2/")]),
        &Overrides::default(),
    )
    .expect("settings");
    assert_eq!(settings.contract_url, "http://env:2/");
    assert_eq!(settings.log_filter, "debug");
    assert_eq!(settings.simulation_delay_ms, 10);

    let settings = build_settings(
        Some(&file),
        env(&[("HERITAGE__CONTRACT_URL", "http://env:2/")]),
        &Overrides {
            contract_url: Some("http://flag:3/".into()),
            wallet_key_path: Some(PathBuf::from("/tmp/key")),
            simulation_delay_ms: Some(0),
        },
    )
    .expect("settings");
    assert_eq!(settings.contract_url, "http://flag:3/");
    assert_eq!(settings.wallet_key_path, PathBuf::from("/tmp/key"));
    assert_eq!(settings.simulation_delay_ms, 0);
}

#[test]
fn explicit_file_must_exist() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("none.toml");
    assert!(build_settings(Some(&missing), env(&[]), &Overrides::default()).is_err());
}

#[test]
fn malformed_values_are_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = build_settings(
        Some(&temp_file(&dir, "bad.toml", "")),
        env(&[("HERITAGE__SIMULATION_DELAY_MS", "soon")]),
        &Overrides::default(),
    );
    assert!(result.is_err());
}
