// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use depth_plane::backends::filters::HoleFillingMode;
use depth_plane::errors::ConfigError;
use depth_plane::{Config, Roi, SourceKind, YRotationSource};
use std::path::PathBuf;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "depth-plane-config-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.source, SourceKind::Synthetic);
    assert_eq!(config.roi, Roi::new(200, 100, 240, 200));
    assert_eq!(config.camera_vector, [0.0, 0.0, -1.0]);
    assert_eq!(
        config.y_rotation,
        YRotationSource::Assumed,
        "Y rotation should use the assumed normal by default"
    );
    assert_eq!(config.hole_filling, Some(HoleFillingMode::FarestFromAround));
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = temp_dir("missing");
    let config = Config::load(&dir.join("nope.json")).unwrap();
    assert_eq!(config, Config::default());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_save_then_load() {
    let dir = temp_dir("save");
    let path = dir.join("nested").join("config.json");

    let config = Config {
        roi: Roi::new(10, 10, 50, 40),
        y_rotation: YRotationSource::Fitted,
        hole_filling: None,
        ..Config::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_unparsable_file_is_an_error() {
    let dir = temp_dir("parse");
    let path = dir.join("config.json");
    std::fs::write(&path, "{ roi: nope").unwrap();

    assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_json_uses_snake_case_names() {
    let json = Config {
        source: SourceKind::Images,
        ..Config::default()
    }
    .to_json()
    .unwrap();

    assert!(json.contains("\"source\": \"images\""));
    assert!(json.contains("\"y_rotation\": \"assumed\""));
    assert!(json.contains("\"hole_filling\": \"farest_from_around\""));
}

#[test]
fn test_colorize_range_must_not_be_empty() {
    let config = Config {
        colorize_min_m: 2.0,
        colorize_max_m: 1.0,
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}
