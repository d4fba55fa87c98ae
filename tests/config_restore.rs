use std::fs;
use std::path::PathBuf;

use lfpsim::config::{DriveShape, IntegratorChoice, SimConfig};
use lfpsim::sim::SimError;

fn unique_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "lfpsim_config_restore_{}_{}",
        name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    path
}

#[test]
fn no_path_gives_defaults() {
    assert_eq!(SimConfig::load_or_default(None).unwrap(), SimConfig::default());
}

#[test]
fn missing_file_gets_commented_template() {
    let path = unique_path("template.toml");
    let _ = fs::remove_file(&path);

    let cfg = SimConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(cfg, SimConfig::default());
    assert!(path.exists(), "template should be written");

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("[population]"));
    assert!(contents.contains("[population.weights]"));
    assert!(contents.contains("[kuramoto]"));
    assert!(contents.contains("# members = 1"));
    assert!(contents.contains("# drive = \"constant\""));
    assert!(contents.contains("# seed = 42"));
    assert!(
        contents
            .lines()
            .filter(|l| l.contains('='))
            .all(|l| l.trim_start().starts_with('#')),
        "every key should be commented out"
    );

    // The template parses back to the defaults.
    let reread = SimConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(reread, SimConfig::default());

    let _ = fs::remove_file(&path);
}

#[test]
fn existing_file_is_restored() {
    let path = unique_path("custom.toml");
    let mut custom = SimConfig::default();
    custom.run.parallel = false;
    custom.population.members = 16;
    custom.population.drive = DriveShape::Drift;
    custom.population.seed = Some(3);
    custom.population.weights.tau_e = 4e-3;
    custom.kuramoto.integrator = IntegratorChoice::Rk4;
    custom.kuramoto.oscillators = 64;
    fs::write(&path, toml::to_string_pretty(&custom).unwrap()).unwrap();

    let cfg = SimConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(cfg, custom);

    let _ = fs::remove_file(&path);
}

#[test]
fn malformed_file_fails_fast() {
    let path = unique_path("broken.toml");
    fs::write(&path, "[population]\nmembers = \"many\"\n").unwrap();

    let err = SimConfig::load_or_default(Some(&path)).unwrap_err();
    assert!(matches!(err, SimError::Config(_)));

    let _ = fs::remove_file(&path);
}
