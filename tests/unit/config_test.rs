//! Configuration file handling and option mapping

use chrono::Utc;
use opsdiag::checks::CheckOptions;
use opsdiag::config::parse_config;
use opsdiag::support::BundleOptions;
use std::path::PathBuf;
use std::time::Duration;

const CONFIG: &str = r#"
soft_timeout_secs = 5
hard_timeout_secs = 20
log_byte_cap = 1048576
log_timeout_secs = 10
max_workers = 2
min_k8s_version = "1.28"

[node]
architectures = ["arm64"]
min_vcpu = 2
min_memory = "8G"
"#;

#[test]
fn test_full_config_document() {
    let config = parse_config(CONFIG).unwrap();
    assert_eq!(config.soft_timeout(), Duration::from_secs(5));
    assert_eq!(config.hard_timeout(), Duration::from_secs(20));
    assert_eq!(config.log_timeout(), Duration::from_secs(10));
    assert_eq!(config.node.architectures, vec!["arm64"]);
    assert_eq!(config.node.min_storage, "30G");
}

#[test]
fn test_check_options_take_thresholds_from_config() {
    let config = parse_config(CONFIG).unwrap();
    let options = CheckOptions::from_config(&config);
    assert_eq!(options.min_k8s_version, "1.28");
    assert_eq!(options.node.min_vcpu, 2);
    assert!(options.as_list);
}

#[test]
fn test_bundle_options_take_limits_from_config() {
    let config = parse_config(CONFIG).unwrap();
    let options = BundleOptions::from_config(&config, PathBuf::from("/tmp"), Utc::now());
    assert!(options.workers <= 2);
    assert!(options.workers >= 1);
    assert_eq!(options.log_byte_cap, Some(1_048_576));
    assert_eq!(options.log_timeout, Duration::from_secs(10));
    assert!(options.services.is_empty());
}
