//! Project configuration file support: reads and writes `project.toml`,
//! producing parsed [`Requirement`]s rather than raw dependency strings so
//! callers can feed them straight to the resolver.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml::Value;

use crate::spec::{Requirement, RequirementParseError};

const CONFIG_FILENAME: &str = "project.toml";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{CONFIG_FILENAME} not found in {0} or any parent directory")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {CONFIG_FILENAME}: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize {CONFIG_FILENAME}: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid dependency entry: {0}")]
    Requirement(#[from] RequirementParseError),
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/// A parsed `project.toml`. Both `[project]` (current) and `[package]`
/// (legacy alias, still read for compatibility) are honored; writes always
/// go to `[project]`.
#[derive(Debug, Clone)]
pub struct Project {
    path: PathBuf,
    raw: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
}

impl Project {
    /// Walks up from `start_dir` looking for `project.toml`.
    pub fn discover(start_dir: impl AsRef<Path>) -> Result<Self> {
        let start = start_dir.as_ref();
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Self::load(&candidate);
            }
            if !current.pop() {
                return Err(ProjectError::NotFound(start.to_path_buf()));
            }
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|source| ProjectError::Read {
            path: path.clone(),
            source,
        })?;
        let raw: Value = content.parse()?;
        Ok(Self { path, raw })
    }

    pub fn new(path: impl AsRef<Path>, name: &str) -> Self {
        let mut root = toml::map::Map::new();
        let mut project = toml::map::Map::new();
        project.insert("name".into(), Value::String(name.to_string()));
        project.insert("version".into(), Value::String("0.1.0".to_string()));
        project.insert("dependencies".into(), Value::Array(vec![]));
        root.insert("project".into(), Value::Table(project));
        Self {
            path: path.as_ref().to_path_buf(),
            raw: Value::Table(root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    fn section(&self) -> Option<&Value> {
        self.raw
            .get("project")
            .or_else(|| self.raw.get("package"))
    }

    pub fn metadata(&self) -> ProjectMetadata {
        let Some(section) = self.section() else {
            return ProjectMetadata::default();
        };
        ProjectMetadata {
            name: section.get("name").and_then(Value::as_str).map(String::from),
            version: section.get("version").and_then(Value::as_str).map(String::from),
            description: section
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
        }
    }

    fn raw_dependency_strings(&self) -> Vec<String> {
        let mut deps: Vec<String> = self
            .section()
            .and_then(|s| s.get("dependencies"))
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        if let Some(table) = self
            .raw
            .get("dependencies")
            .and_then(Value::as_table)
        {
            for (name, spec) in table {
                let range = spec.as_str().unwrap_or("*");
                deps.push(format!("{name} {range}"));
            }
        }

        deps
    }

    /// Every dependency in the file, parsed into [`Requirement`]s.
    pub fn requirements(&self) -> Result<Vec<Requirement>> {
        self.raw_dependency_strings()
            .iter()
            .map(|raw| Requirement::parse(raw).map_err(ProjectError::from))
            .collect()
    }

    pub fn has_dependency(&self, name: &str) -> bool {
        let name_lower = name.to_lowercase();
        self.raw_dependency_strings()
            .iter()
            .any(|d| extract_package_name(d).to_lowercase() == name_lower)
    }

    /// Adds or replaces a dependency entry in `[project.dependencies]`.
    pub fn add_dependency(&mut self, raw: &str) -> Result<()> {
        Requirement::parse(raw)?;

        let root = self.raw.as_table_mut().expect("project root is a table");
        let project = root
            .entry("project")
            .or_insert_with(|| Value::Table(toml::map::Map::new()));
        let Value::Table(project_table) = project else {
            unreachable!("project section is always a table")
        };
        let deps = project_table
            .entry("dependencies")
            .or_insert_with(|| Value::Array(vec![]));
        let Value::Array(arr) = deps else {
            unreachable!("dependencies is always an array")
        };

        let name = extract_package_name(raw);
        arr.retain(|v| v.as_str().map(|s| extract_package_name(s) != name).unwrap_or(true));
        arr.push(Value::String(raw.to_string()));
        arr.sort_by(|a, b| a.as_str().unwrap_or("").cmp(b.as_str().unwrap_or("")));
        Ok(())
    }

    pub fn remove_dependency(&mut self, name: &str) -> bool {
        let name_lower = name.to_lowercase();
        let mut removed = false;
        if let Some(Value::Table(project)) = self.raw.get_mut("project") {
            if let Some(Value::Array(deps)) = project.get_mut("dependencies") {
                let before = deps.len();
                deps.retain(|v| {
                    v.as_str()
                        .map(|s| extract_package_name(s).to_lowercase() != name_lower)
                        .unwrap_or(true)
                });
                removed = deps.len() < before;
            }
        }
        removed
    }

    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(&self.raw)?;
        fs::write(&self.path, content).map_err(|source| ProjectError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn extract_package_name(dep: &str) -> &str {
    let dep = dep.trim();
    let end = dep
        .find(|c: char| c.is_whitespace() || "=<>!~^[".contains(c))
        .unwrap_or(dep.len());
    dep[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn extract_package_name_stops_at_operator() {
        assert_eq!(extract_package_name("requests >=2.28.0"), "requests");
        assert_eq!(extract_package_name("requests==2.28.0"), "requests");
        assert_eq!(extract_package_name("  numpy  "), "numpy");
    }

    #[test]
    fn new_project_has_no_requirements() {
        let temp = tempdir().unwrap();
        let project = Project::new(temp.path().join(CONFIG_FILENAME), "demo");
        assert!(project.requirements().unwrap().is_empty());
    }

    #[test]
    fn add_dependency_round_trips() {
        let temp = tempdir().unwrap();
        let mut project = Project::new(temp.path().join(CONFIG_FILENAME), "demo");
        project.add_dependency("requests >=2.28.0").unwrap();
        assert!(project.has_dependency("requests"));
        let reqs = project.requirements().unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].name(), "requests");
    }

    #[test]
    fn add_dependency_replaces_existing() {
        let temp = tempdir().unwrap();
        let mut project = Project::new(temp.path().join(CONFIG_FILENAME), "demo");
        project.add_dependency("requests >=2.28.0").unwrap();
        project.add_dependency("requests >=2.31.0").unwrap();
        assert_eq!(project.requirements().unwrap().len(), 1);
    }

    #[test]
    fn remove_dependency_works() {
        let temp = tempdir().unwrap();
        let mut project = Project::new(temp.path().join(CONFIG_FILENAME), "demo");
        project.add_dependency("requests >=2.28.0").unwrap();
        project.add_dependency("numpy >=1.24.0").unwrap();
        assert!(project.remove_dependency("requests"));
        assert!(!project.has_dependency("requests"));
        assert!(project.has_dependency("numpy"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        let mut project = Project::new(&path, "demo");
        project.add_dependency("requests >=2.28.0").unwrap();
        project.save().unwrap();

        let loaded = Project::load(&path).unwrap();
        assert!(loaded.has_dependency("requests"));
    }
}
