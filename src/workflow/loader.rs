//! Pipeline definition loader
//!
//! Loads a pipeline YAML file and validates it before anything runs.

use std::collections::HashSet;
use std::path::Path;

use super::expressions;
use super::Pipeline;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("Pipeline '{0}' declares no stages")]
    NoStages(String),

    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("Stage #{0} has an empty name")]
    EmptyStageName(usize),

    #[error("Stage '{0}' has an empty program")]
    EmptyProgram(String),

    #[error("Stage '{stage}' has an invalid template: {error}")]
    Template { stage: String, error: String },

    #[error("Compliance stage '{0}' is not declared")]
    UnknownComplianceStage(String),

    #[error("Compliance stage '{0}' declares no artifact")]
    MissingArtifact(String),

    #[error("Compliance marker is empty")]
    EmptyMarker,
}

pub struct PipelineLoader;

impl PipelineLoader {
    pub fn load_file(path: &Path) -> Result<Pipeline, LoadError> {
        let content = std::fs::read_to_string(path)?;
        let pipeline: Pipeline = serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
            file: path.display().to_string(),
            error: e,
        })?;
        Self::validate(&pipeline)?;
        Ok(pipeline)
    }

    pub fn load_str(yaml: &str) -> Result<Pipeline, LoadError> {
        let pipeline: Pipeline = serde_yaml::from_str(yaml).map_err(|e| LoadError::Yaml {
            file: "<inline>".to_string(),
            error: e,
        })?;
        Self::validate(&pipeline)?;
        Ok(pipeline)
    }

    /// Reject definitions the orchestrator could not run unambiguously
    pub fn validate(pipeline: &Pipeline) -> Result<(), LoadError> {
        if pipeline.stages.is_empty() {
            return Err(LoadError::NoStages(pipeline.name.clone()));
        }

        let mut seen = HashSet::new();
        for (idx, stage) in pipeline.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(LoadError::EmptyStageName(idx + 1));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(LoadError::DuplicateStage(stage.name.clone()));
            }
            if stage.run.program.trim().is_empty() {
                return Err(LoadError::EmptyProgram(stage.name.clone()));
            }

            let templates = std::iter::once(&stage.run.program)
                .chain(stage.run.args.iter())
                .chain(stage.env.values());
            for template in templates {
                expressions::validate(template).map_err(|e| LoadError::Template {
                    stage: stage.name.clone(),
                    error: e.to_string(),
                })?;
            }
        }

        if let Some(gate) = &pipeline.compliance {
            if gate.marker.is_empty() {
                return Err(LoadError::EmptyMarker);
            }
            let stage = pipeline
                .stage(&gate.stage)
                .ok_or_else(|| LoadError::UnknownComplianceStage(gate.stage.clone()))?;
            if stage.artifact.is_none() {
                return Err(LoadError::MissingArtifact(stage.name.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");

        fs::write(
            &path,
            r#"
name: single-pipeline
stages:
  - name: sast
    run:
      program: semgrep
      args: ["--config", "auto"]
"#,
        )
        .unwrap();

        let pipeline = PipelineLoader::load_file(&path).unwrap();
        assert_eq!(pipeline.name, "single-pipeline");
        assert_eq!(pipeline.stages[0].run.args, vec!["--config", "auto"]);
    }

    #[test]
    fn test_rejects_duplicate_stage_names() {
        let yaml = r#"
name: dup
stages:
  - name: Compliance Scanning - Qualys
    run: { program: qualys }
  - name: Compliance Scanning - Qualys
    run: { program: qualys, args: ["--again"] }
"#;

        let err = PipelineLoader::load_str(yaml).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateStage(name) if name == "Compliance Scanning - Qualys"));
    }

    #[test]
    fn test_rejects_empty_pipeline() {
        let err = PipelineLoader::load_str("name: empty\nstages: []\n").unwrap_err();
        assert!(matches!(err, LoadError::NoStages(_)));
    }

    #[test]
    fn test_rejects_empty_program() {
        let yaml = r#"
name: p
stages:
  - name: blank
    run: { program: "  " }
"#;
        assert!(matches!(
            PipelineLoader::load_str(yaml).unwrap_err(),
            LoadError::EmptyProgram(_)
        ));
    }

    #[test]
    fn test_rejects_unknown_compliance_stage() {
        let yaml = r#"
name: p
compliance:
  stage: qualys
stages:
  - name: sast
    run: { program: semgrep }
"#;
        assert!(matches!(
            PipelineLoader::load_str(yaml).unwrap_err(),
            LoadError::UnknownComplianceStage(_)
        ));
    }

    #[test]
    fn test_rejects_compliance_stage_without_artifact() {
        let yaml = r#"
name: p
compliance:
  stage: qualys
stages:
  - name: qualys
    run: { program: qualys-scan }
"#;
        assert!(matches!(
            PipelineLoader::load_str(yaml).unwrap_err(),
            LoadError::MissingArtifact(_)
        ));
    }

    #[test]
    fn test_rejects_bad_template() {
        let yaml = r#"
name: p
stages:
  - name: trivy
    run:
      program: trivy
      args: ["image", "${{ steps.build.outputs.image }}"]
"#;
        assert!(matches!(
            PipelineLoader::load_str(yaml).unwrap_err(),
            LoadError::Template { .. }
        ));
    }

    #[test]
    fn test_rejects_bad_template_in_stage_env() {
        let yaml = r#"
name: p
stages:
  - name: trivy
    run:
      program: trivy
    env:
      TRIVY_IMAGE: "${{ steps.build.outputs.image }}"
"#;
        let err = PipelineLoader::load_str(yaml).unwrap_err();
        assert!(matches!(err, LoadError::Template { ref stage, .. } if stage == "trivy"));
    }

    #[test]
    fn test_yaml_error_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "name: [unterminated").unwrap();

        let err = PipelineLoader::load_file(&path).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }
}
