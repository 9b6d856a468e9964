use super::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
#[serial]
fn data_dir_env_override() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");

    // SAFETY: serialised with every other test touching the environment
    unsafe { std::env::set_var(settings::DATA_DIR_ENV, temp_dir.path()) };
    let dir = get_config_dir().expect("should resolve config dir");
    // SAFETY: see above
    unsafe { std::env::remove_var(settings::DATA_DIR_ENV) };

    assert_eq!(dir, temp_dir.path());
}

#[test]
#[serial]
fn empty_env_falls_back_to_home() {
    // SAFETY: serialised with every other test touching the environment
    unsafe { std::env::set_var(settings::DATA_DIR_ENV, "") };
    let dir = get_config_dir();
    // SAFETY: see above
    unsafe { std::env::remove_var(settings::DATA_DIR_ENV) };

    if let Ok(dir) = dir {
        assert!(dir.ends_with(".nexus-rag") || dir.ends_with("nexus-rag"));
    }
}

#[test]
fn config_file_persistence() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config_path = temp_dir.path().join("config.toml");

    let original_config = Config {
        embedder: EmbedderConfig {
            protocol: "https".to_string(),
            host: "test-host".to_string(),
            port: 8080,
            model: "test-model".to_string(),
            ..EmbedderConfig::default()
        },
        ..Config::default()
    };

    let toml_content = toml::to_string_pretty(&original_config)
        .expect("config should convert to toml string successfully");
    fs::write(&config_path, toml_content).expect("should write to config_path successfully");

    let content =
        fs::read_to_string(&config_path).expect("should read from config_path successfully");
    let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

    assert_eq!(original_config, loaded_config);
}

#[test]
fn invalid_toml_handling() {
    let invalid_toml = r#"
        [embedder
        host = "localhost"
        port = "invalid_port"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
    assert!(result.is_err());
}
