use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_routerag"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "routerag init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".routerag.toml");
    assert!(config_path.exists(), ".routerag.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[embedding]"));
    assert!(content.contains("[[router.rules]]"));

    // The written file must round-trip through the real loader, rules included.
    let config = routerag_core::RouteragConfig::from_toml(&content).unwrap();
    let defaults = routerag_core::RouterConfig::default();
    assert_eq!(config.router.rules, defaults.rules);
    assert_eq!(config.router.descriptions, defaults.descriptions);
    assert_eq!(config.router.rule_confidence, 0.9);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".routerag.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_routerag"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".routerag.toml")).unwrap(),
        "# existing"
    );
}
