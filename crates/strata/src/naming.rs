// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Environment naming.

use crate::{BaseEnvSpec, ProjectSpec};

#[cfg(test)]
#[path = "./naming_test.rs"]
mod naming_test;

/// Name of the environment a project builds into.
///
/// - no base environment: the project name
/// - a `<stem>-base` template: `<stem>-<project name>`
/// - any other base: its declared name, shared by every project using it
pub fn environment_name(project: &ProjectSpec, base: Option<&BaseEnvSpec>) -> String {
    match base {
        None => project.name.clone(),
        Some(base) => match base.template_stem() {
            Some(stem) => format!("{stem}-{}", project.name),
            None => base.declared_name.clone(),
        },
    }
}
