// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

#[rstest]
fn test_parse_env_file() {
    let yaml = r#"
name: team-base
channels:
  - conda-forge
dependencies:
  - python=3.10
  - cudatoolkit
  - pip:
      - black
      - ruff
"#;

    let file = EnvFile::from_yaml(yaml, Path::new("environment.yaml")).expect("valid file");
    let base = BaseEnvSpec::from_env_file(file, Path::new("/repo/environment.yaml"));

    assert_eq!(base.declared_name, "team-base");
    assert!(base.is_base_template);
    assert_eq!(base.template_stem(), Some("team"));
    assert_eq!(base.channels, vec!["conda-forge"]);
    assert_eq!(
        base.dependencies,
        vec!["python=3.10", "cudatoolkit", "pip:black", "pip:ruff"]
    );
}

#[rstest]
#[case("team-base", true)]
#[case("team", false)]
#[case("base", false)]
#[case("base-team", false)]
fn test_template_detection(#[case] name: &str, #[case] is_template: bool) {
    let file = EnvFile::from_yaml(format!("name: {name}\n"), Path::new("env.yaml")).unwrap();
    let base = BaseEnvSpec::from_env_file(file, Path::new("env.yaml"));

    assert_eq!(base.is_base_template, is_template);
    assert_eq!(base.template_stem().is_some(), is_template);
}

#[rstest]
#[case::no_name("channels: [conda-forge]\n", "missing 'name'")]
#[case::empty_name("name: ''\n", "must not be empty")]
#[case::list_name("name: [a, b]\n", "must be a string")]
#[case::not_yaml("name: [unclosed\n", "")]
fn test_malformed_env_file(#[case] yaml: &str, #[case] reason_contains: &str) {
    let err = EnvFile::from_yaml(yaml, Path::new("environment.yaml")).expect_err("malformed");

    match err {
        Error::BaseEnvMalformed { reason, .. } => {
            assert!(reason.contains(reason_contains), "got {reason}")
        }
        other => panic!("expected BaseEnvMalformed, got {other:?}"),
    }
}

#[rstest]
fn test_load_records_source_path() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("environment.yml");
    std::fs::write(&path, "name: shared\ndependencies:\n  - numpy\n").unwrap();

    let file = EnvFile::load(&path).unwrap();
    let base = BaseEnvSpec::load(&path).unwrap();

    assert_eq!(file.source_path.as_deref(), Some(path.as_path()));
    assert_eq!(base.source_path, path);
    assert!(!base.is_base_template);
    assert_eq!(base.template_stem(), None);
}

#[rstest]
fn test_load_missing_file() {
    let tmp = TempDir::new().unwrap();

    let err = EnvFile::load(tmp.path().join("environment.yaml")).expect_err("missing");

    assert!(matches!(err, Error::ReadFailed { .. }));
}
