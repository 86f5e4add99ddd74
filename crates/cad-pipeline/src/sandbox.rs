use std::fs;
use std::path::{Path, PathBuf};

use cad_mesh::{Mesh, mesh_solid, to_ascii_stl, to_binary_stl};
use cad_script::{RESULT_VARIABLE, ResultLookup, SandboxLimits, run_script};
use tracing::{debug, warn};

use crate::artifact_path;
use crate::config::PipelineConfig;
use crate::error::ExecutionError;

/// Runs scripts with only the geometry and math namespaces in reach and
/// writes the exported model as an STL file.
#[derive(Debug, Clone)]
pub struct Sandbox {
    temp_root: PathBuf,
    resolution: usize,
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(temp_root: impl Into<PathBuf>, resolution: usize, limits: SandboxLimits) -> Self {
        Self {
            temp_root: temp_root.into(),
            resolution,
            limits,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.temp_dir, config.mesh_resolution, config.limits)
    }

    pub fn artifact_path(&self, artifact_id: &str) -> PathBuf {
        artifact_path(&self.temp_root, artifact_id)
    }

    /// Evaluates `script`, meshes its result object and writes
    /// `model_<artifact_id>.stl` as binary STL.
    pub fn execute(&self, script: &str, artifact_id: &str) -> Result<PathBuf, ExecutionError> {
        let evaluation = run_script(script, &self.limits)?;
        let solid = match evaluation.lookup_result(RESULT_VARIABLE) {
            ResultLookup::Bound(solid) => solid,
            ResultLookup::Substituted { name, solid } => {
                warn!(
                    binding = name,
                    "'{RESULT_VARIABLE}' is not bound, exporting '{name}' instead"
                );
                solid
            }
            ResultLookup::NotExportable { kind } => {
                return Err(ExecutionError::ResultNotExportable { kind });
            }
            ResultLookup::Missing { available } => {
                return Err(ExecutionError::NoResultObject { available });
            }
        };

        let extent = solid.bounds().largest_extent();
        if !extent.is_finite() || extent > self.limits.max_extent {
            return Err(ExecutionError::ModelTooLarge {
                extent,
                limit: self.limits.max_extent,
            });
        }

        let mesh = mesh_solid(solid, self.resolution);
        if mesh.is_empty() {
            return Err(ExecutionError::EmptyArtifact);
        }
        debug!(
            triangles = mesh.triangles.len(),
            vertices = mesh.vertices.len(),
            "meshed result object"
        );

        let path = self.artifact_path(artifact_id);
        write_artifact(&path, &to_binary_stl(&mesh, "model"))?;
        Ok(path)
    }

    /// Writes the fixed ±1 mm cube used when a system script cannot run.
    pub fn write_default_artifact(&self, artifact_id: &str) -> Result<PathBuf, ExecutionError> {
        let path = self.artifact_path(artifact_id);
        let stl = to_ascii_stl(&Mesh::cuboid([1.0, 1.0, 1.0]), "cube");
        write_artifact(&path, stl.as_bytes())?;
        Ok(path)
    }
}

fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), ExecutionError> {
    let io_error = |source| ExecutionError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, bytes).map_err(io_error)?;
    let written = fs::metadata(path).map_err(io_error)?.len();
    if written == 0 {
        return Err(ExecutionError::EmptyArtifact);
    }
    Ok(())
}
