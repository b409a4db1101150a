// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::fixtures::{write_env_file, write_project};
use crate::describe;

fn canonical_tmp() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = dunce::canonicalize(tmp.path()).unwrap();
    (tmp, root)
}

#[rstest]
fn test_find_in_start_directory() {
    let (_tmp, root) = canonical_tmp();
    let path = write_env_file(&root, "environment.yaml", "team-base");

    let outcome = find_upward(&root, &ENV_FILENAMES);

    assert_eq!(outcome.found, Some(path.clone()));
    assert_eq!(outcome.trail, vec![path]);
}

#[rstest]
fn test_find_in_ancestor_records_trail() {
    let (_tmp, root) = canonical_tmp();
    let found = write_env_file(&root, "environment.yml", "team-base");
    let nested = root.join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();

    let outcome = find_upward(&nested, &ENV_FILENAMES);

    assert_eq!(outcome.found, Some(found.clone()));
    assert_eq!(
        outcome.trail,
        vec![
            nested.join("environment.yaml"),
            nested.join("environment.yml"),
            root.join("a").join("environment.yaml"),
            root.join("a").join("environment.yml"),
            root.join("environment.yaml"),
            found,
        ]
    );
}

#[rstest]
fn test_yaml_checked_before_yml() {
    let (_tmp, root) = canonical_tmp();
    let yaml = write_env_file(&root, "environment.yaml", "first");
    write_env_file(&root, "environment.yml", "second");

    let outcome = find_upward(&root, &ENV_FILENAMES);

    assert_eq!(outcome.found, Some(yaml));
}

#[rstest]
fn test_directories_are_not_matches() {
    let (_tmp, root) = canonical_tmp();
    let project = root.join("project");
    std::fs::create_dir_all(project.join("environment.yaml")).unwrap();
    let parent_file = write_env_file(&root, "environment.yaml", "root-base");

    let outcome = find_upward(&project, &ENV_FILENAMES);

    assert_eq!(outcome.found, Some(parent_file));
}

#[rstest]
fn test_sibling_directories_not_searched() {
    let (_tmp, root) = canonical_tmp();
    write_env_file(&root.join("sibling"), "environment.yaml", "sibling-base");
    let project = root.join("project");
    std::fs::create_dir_all(&project).unwrap();

    let outcome = find_upward(&project, &ENV_FILENAMES);

    assert!(
        outcome
            .found
            .as_ref()
            .is_none_or(|found| !found.starts_with(root.join("sibling")))
    );
}

#[rstest]
fn test_resolve_prefers_project_local_file() {
    let (_tmp, root) = canonical_tmp();
    write_env_file(&root, "environment.yaml", "root-base");
    let dir = write_project(&root.join("project"), "svc", true);
    write_env_file(&dir, "environment.yaml", "local-base");
    let project = describe(&dir).unwrap();

    let resolution = resolve_base_env(&project).unwrap();

    let base = resolution.base.expect("a base environment");
    assert_eq!(base.declared_name, "local-base");
    assert_eq!(resolution.search.unwrap().trail.len(), 1);
}

#[rstest]
fn test_resolve_explicit_base_env() {
    let (_tmp, root) = canonical_tmp();
    write_env_file(&root, "environment.yaml", "root-base");
    let dir = write_project(&root.join("project"), "svc", true);
    write_env_file(&dir.join("envs"), "gpu.yaml", "gpu-base");
    let manifest = std::fs::read_to_string(dir.join("pyproject.toml")).unwrap();
    std::fs::write(
        dir.join("pyproject.toml"),
        format!("{manifest}\n[tool.strata]\nbase_env = \"envs/gpu.yaml\"\n"),
    )
    .unwrap();
    let project = describe(&dir).unwrap();

    let resolution = resolve_base_env(&project).unwrap();

    assert_eq!(resolution.base.unwrap().declared_name, "gpu-base");
    assert!(resolution.search.is_none(), "explicit path skips the walk");
}

#[rstest]
fn test_resolve_missing_explicit_base_env() {
    let (_tmp, root) = canonical_tmp();
    let dir = write_project(&root.join("project"), "svc", true);
    let manifest = std::fs::read_to_string(dir.join("pyproject.toml")).unwrap();
    std::fs::write(
        dir.join("pyproject.toml"),
        format!("{manifest}\n[tool.strata]\nbase_env = \"missing.yaml\"\n"),
    )
    .unwrap();
    let project = describe(&dir).unwrap();

    let err = resolve_base_env(&project).expect_err("missing base env");

    assert!(matches!(err, Error::BaseEnvNotFound { .. }));
    assert_eq!(err.exit_code(), 5);
}

#[rstest]
fn test_resolve_malformed_discovered_file() {
    let (_tmp, root) = canonical_tmp();
    std::fs::write(root.join("environment.yaml"), "channels: []\n").unwrap();
    let dir = write_project(&root.join("project"), "svc", true);
    let project = describe(&dir).unwrap();

    let err = resolve_base_env(&project).expect_err("no name");

    assert!(matches!(err, Error::BaseEnvMalformed { .. }));
    assert_eq!(err.exit_code(), 6);
}

#[rstest]
fn test_resolve_is_deterministic() {
    let (_tmp, root) = canonical_tmp();
    write_env_file(&root, "environment.yaml", "team-base");
    let dir = write_project(&root.join("a").join("svc"), "svc", true);
    let project = describe(&dir).unwrap();

    let first = resolve_base_env(&project).unwrap();
    let second = resolve_base_env(&project).unwrap();

    assert_eq!(first, second);
}
