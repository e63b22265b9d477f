//! Workflow definition parser.
//!
//! Parses YAML workflow files into [`Workflow`] structs.

use std::path::{Path, PathBuf};

use super::error::{Result, WorkflowError};
use super::schema::Workflow;
use super::template::placeholders;

/// Directories searched by [`discover_workflows`], relative to the project root.
pub const WORKFLOW_DIRS: [&str; 2] = [".guidepost/workflows", "workflows"];

/// Parse a workflow from a file.
pub fn parse_workflow(path: &Path) -> Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| WorkflowError::Read { path: path.to_path_buf(), source })?;
    parse_workflow_str(&content)
}

/// Parse a workflow from a string.
pub fn parse_workflow_str(content: &str) -> Result<Workflow> {
    let workflow: Workflow = serde_yaml::from_str(content)?;
    let workflow = workflow.normalize()?;
    warn_unknown_placeholders(&workflow);
    Ok(workflow)
}

/// Warn about prompt placeholders that no earlier step can fill.
fn warn_unknown_placeholders(workflow: &Workflow) {
    for (i, step) in workflow.steps.iter().enumerate() {
        for name in placeholders(&step.prompt_text) {
            if !workflow.steps[..i].iter().any(|s| s.id == name) {
                tracing::warn!(step = %step.id, placeholder = name, "Prompt references no earlier step");
            }
        }
    }
}

/// A workflow found on disk.
#[derive(Debug, Clone)]
pub struct DiscoveredWorkflow {
    /// File the workflow was read from
    pub path: PathBuf,

    /// Parsed definition
    pub workflow: Workflow,
}

/// Discover workflows under a project root.
///
/// Files that fail to parse are logged and skipped.
pub fn discover_workflows(root: &Path) -> Vec<DiscoveredWorkflow> {
    let mut found = Vec::new();

    for dir in WORKFLOW_DIRS {
        let dir = root.join(dir);
        if dir.is_dir() {
            found.extend(scan_workflow_dir(&dir));
        }
    }

    found
}

/// Scan a directory for workflow files.
fn scan_workflow_dir(dir: &Path) -> Vec<DiscoveredWorkflow> {
    let mut found = Vec::new();

    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };

    for entry in entries.filter_map(std::result::Result::ok) {
        let path = entry.path();
        if !path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
            continue;
        }
        match parse_workflow(&path) {
            Ok(workflow) => {
                tracing::debug!(path = %path.display(), id = %workflow.id, "Discovered workflow");
                found.push(DiscoveredWorkflow { path, workflow });
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse workflow");
            }
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

/// Resolve a workflow argument: a file path, else a workflow id or file
/// stem among the discovered workflows.
pub fn find_workflow(root: &Path, name: &str) -> Result<Workflow> {
    let as_path = Path::new(name);
    if as_path.is_file() {
        return parse_workflow(as_path);
    }

    discover_workflows(root)
        .into_iter()
        .find(|d| d.workflow.id == name || d.path.file_stem().is_some_and(|stem| stem == name))
        .map(|d| d.workflow)
        .ok_or_else(|| {
            WorkflowError::Read {
                path: as_path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or workflow"),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepKind;
    use tempfile::TempDir;

    const INIT: &str = r#"
id: init
command: new
description: Create a project
steps:
  - id: name
    name: Project name
    prompt: What is the project called?
    validator: pattern
    pattern: "^[a-z][a-z0-9-]*$"
    example: my-project
    flag: --project-name
  - id: size
    name: Size
    prompt: How big is {{ name }}?
    required: false
    default: medium
    options:
      - key: small
        description: One service
      - key: medium
      - key: large
  - id: docker
    name: Docker
    prompt: Add a Dockerfile?
    kind: confirm
    required: false
    default: "no"
"#;

    #[test]
    fn test_parse_workflow() {
        let workflow = parse_workflow_str(INIT).unwrap();

        assert_eq!(workflow.id, "init");
        assert_eq!(workflow.command_name, "new");
        assert!(workflow.interactive);
        assert_eq!(workflow.step_ids(), vec!["name", "size", "docker"]);
        assert_eq!(workflow.steps[1].kind(), StepKind::Choice);
        assert_eq!(workflow.steps[1].order(), 2);
        assert_eq!(workflow.steps[2].kind(), StepKind::Confirm);
        assert_eq!(workflow.steps[0].flag.as_deref(), Some("--project-name"));
    }

    #[test]
    fn test_parse_rejects_bad_definitions() {
        let yaml = "id: x\ncommand: y\nsteps: []\n";
        assert!(matches!(parse_workflow_str(yaml), Err(WorkflowError::InvalidDefinition { .. })));

        assert!(matches!(parse_workflow_str("steps: 3"), Err(WorkflowError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_workflow(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, WorkflowError::Read { .. }));
    }

    #[test]
    fn test_discover_workflows() {
        let dir = TempDir::new().unwrap();
        let workflows = dir.path().join(".guidepost").join("workflows");
        std::fs::create_dir_all(&workflows).unwrap();
        std::fs::write(workflows.join("init.yaml"), INIT).unwrap();
        std::fs::write(workflows.join("broken.yml"), "id: [").unwrap();
        std::fs::write(workflows.join("README.md"), "# nope").unwrap();

        let found = discover_workflows(dir.path());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].workflow.id, "init");

        assert_eq!(find_workflow(dir.path(), "init").unwrap().command_name, "new");
        assert!(find_workflow(dir.path(), "missing").is_err());
    }
}
