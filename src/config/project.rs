//! `minz.toml` project manifest. Deliberately small: no dependency
//! resolution, no workspace graph, no `serde` -- just `[project]` and
//! `[target]` sections, the minimum the collaborator CLI needs to find an
//! entry file and a default backend. Grounded on
//! `mastercyb-trident/src/config/project.rs`'s hand-rolled, section-aware
//! line parser.

use std::path::{Path, PathBuf};

const MAX_PROJECT_NAME_LEN: usize = 128;

/// Validate a project name from `minz.toml`: no path separators, no `..`
/// traversal, no control characters, bounded length.
pub fn validate_project_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("project name must not be empty".to_string());
    }
    if name.len() > MAX_PROJECT_NAME_LEN {
        return Err(format!("project name exceeds {MAX_PROJECT_NAME_LEN} characters"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err("project name must not contain path separators ('/' or '\\')".to_string());
    }
    if name.contains("..") {
        return Err("project name must not contain '..'".to_string());
    }
    if name.chars().any(|c| c.is_control()) {
        return Err("project name must not contain control characters".to_string());
    }
    Ok(())
}

/// Minimal project configuration from `minz.toml`.
#[derive(Clone, Debug)]
pub struct MinzProject {
    pub name: String,
    pub version: String,
    pub entry: PathBuf,
    pub root_dir: PathBuf,
/// Default backend name (e.g. `"z80"`), overridden by `--backend`.
    pub default_backend: Option<String>,
}

impl MinzProject {
    pub fn load(toml_path: &Path) -> Result<MinzProject, String> {
        let content = std::fs::read_to_string(toml_path).map_err(|e| format!("cannot read '{}': {e}", toml_path.display()))?;
        Self::parse(&content, toml_path.parent().unwrap_or(Path::new(".")))
    }

    /// Section-aware minimal TOML parsing, matching the teacher's
    /// `Project::load` line-by-line approach rather than pulling in `toml`
    /// for three scalar fields.
    pub fn parse(content: &str, root_dir: &Path) -> Result<MinzProject, String> {
        let mut name = String::new();
        let mut version = String::new();
        let mut entry = String::new();
        let mut default_backend: Option<String> = None;
        let mut current_section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = trimmed[1..trimmed.len() - 1].to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            match (current_section.as_str(), key) {
                ("project", "name") => name = value.to_string(),
                ("project", "version") => version = value.to_string(),
                ("project", "entry") => entry = value.to_string(),
                ("target", "backend") => default_backend = Some(value.to_string()),
                _ => {}
            }
        }

        if name.is_empty() {
            return Err("minz.toml missing [project] name".to_string());
        }
        validate_project_name(&name)?;
        if entry.is_empty() {
            return Err("minz.toml missing [project] entry".to_string());
        }

        Ok(MinzProject {
            name,
            version: if version.is_empty() { "0.0.0".to_string() } else { version },
            entry: root_dir.join(entry),
            root_dir: root_dir.to_path_buf(),
            default_backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let content = "[project]\nname = \"demo\"\nversion = \"0.1.0\"\nentry = \"src/main.minz\"\n\n[target]\nbackend = \"z80\"\n";
        let project = MinzProject::parse(content, Path::new("/proj")).unwrap();
        assert_eq!(project.name, "demo");
        assert_eq!(project.version, "0.1.0");
        assert_eq!(project.entry, Path::new("/proj/src/main.minz"));
        assert_eq!(project.default_backend.as_deref(), Some("z80"));
    }

    #[test]
    fn rejects_path_traversal_in_name() {
        assert!(validate_project_name("../evil").is_err());
    }

    #[test]
    fn missing_entry_is_an_error() {
        let content = "[project]\nname = \"demo\"\n";
        assert!(MinzProject::parse(content, Path::new(".")).is_err());
    }

    #[test]
    fn defaults_version_when_absent() {
        let content = "[project]\nname = \"demo\"\nentry = \"main.minz\"\n";
        let project = MinzProject::parse(content, Path::new(".")).unwrap();
        assert_eq!(project.version, "0.0.0");
    }
}
