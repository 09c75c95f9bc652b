use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure for pipeworks.toml
///
/// Optional: every input can also be passed on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeworksConfig {
    pub project: ProjectConfig,

    #[serde(default)]
    pub inputs: InputsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

/// Input files, relative to pipeworks.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,

    /// Binary FileDescriptorSet, e.g. from `protoc --descriptor_set_out`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptors: Option<String>,

    /// `pipeline.module.*` override properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "./target/pipeworks".to_string()
}

impl PipeworksConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: PipeworksConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load config, returning None if file doesn't exist
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.name.trim().is_empty() {
            anyhow::bail!("Project name cannot be empty");
        }
        Ok(())
    }
}

/// Paths from the command line, each overriding its pipeworks.toml entry.
#[derive(Debug, Clone, Default)]
pub struct InputOverrides {
    pub pipeline: Option<PathBuf>,
    pub descriptors: Option<PathBuf>,
    pub modules: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Fully resolved input locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInputs {
    pub name: String,
    pub pipeline: PathBuf,
    pub descriptors: PathBuf,
    pub modules: Option<PathBuf>,
    pub output_dir: PathBuf,
}

/// Merge pipeworks.toml (if present) with command-line overrides.
pub fn resolve_inputs(config_path: &str, overrides: InputOverrides) -> Result<ResolvedInputs> {
    let config_path = Path::new(config_path);
    let config = PipeworksConfig::load_optional(config_path)?;
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let relative = |value: &Option<String>| value.as_ref().map(|v| base.join(v));

    let (name, inputs, output) = match &config {
        Some(c) => (
            c.project.name.clone(),
            c.inputs.clone(),
            base.join(&c.output.dir),
        ),
        None => (
            "pipeline".to_string(),
            InputsConfig::default(),
            PathBuf::from(default_output_dir()),
        ),
    };

    let pipeline = overrides
        .pipeline
        .or_else(|| relative(&inputs.pipeline))
        .with_context(|| {
            format!(
                "No pipeline description given: pass --pipeline or set [inputs] pipeline in {}",
                config_path.display()
            )
        })?;
    let descriptors = overrides
        .descriptors
        .or_else(|| relative(&inputs.descriptors))
        .with_context(|| {
            format!(
                "No descriptor set given: pass --descriptors or set [inputs] descriptors in {}",
                config_path.display()
            )
        })?;

    Ok(ResolvedInputs {
        name,
        pipeline,
        descriptors,
        modules: overrides.modules.or_else(|| relative(&inputs.modules)),
        output_dir: overrides.output.unwrap_or(output),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("pipeworks.toml");
        fs::write(
            &config_path,
            r#"
[project]
name = "orders"

[inputs]
pipeline = "pipeline.toml"
descriptors = "build/orders.desc"
"#,
        )
        .unwrap();

        let inputs =
            resolve_inputs(config_path.to_str().unwrap(), InputOverrides::default()).unwrap();
        assert_eq!(inputs.name, "orders");
        assert_eq!(inputs.pipeline, dir.path().join("pipeline.toml"));
        assert_eq!(inputs.descriptors, dir.path().join("build/orders.desc"));
        assert_eq!(inputs.modules, None);
        assert_eq!(inputs.output_dir, dir.path().join("./target/pipeworks"));
    }

    #[test]
    fn test_overrides_win_and_config_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("pipeworks.toml");
        let overrides = InputOverrides {
            pipeline: Some(PathBuf::from("p.toml")),
            descriptors: Some(PathBuf::from("d.desc")),
            modules: None,
            output: Some(PathBuf::from("out")),
        };

        let inputs = resolve_inputs(missing.to_str().unwrap(), overrides).unwrap();
        assert_eq!(inputs.name, "pipeline");
        assert_eq!(inputs.pipeline, PathBuf::from("p.toml"));
        assert_eq!(inputs.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_missing_pipeline_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("pipeworks.toml");
        let err = resolve_inputs(missing.to_str().unwrap(), InputOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("--pipeline"));
    }

    #[test]
    fn test_empty_project_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("pipeworks.toml");
        fs::write(&config_path, "[project]\nname = \"\"\n").unwrap();
        assert!(PipeworksConfig::load(&config_path).is_err());
    }
}
