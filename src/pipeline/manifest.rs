// The manifest written to `<out>/commits.json` (spec §6 Output) and the
// optional `visualization.json` written alongside it in interactive mode.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::DiffmuxError;

/// A cluster joined with its patch file paths and commit message
/// (spec §3 `CommitGroup`).
#[derive(Debug, Clone, Serialize)]
pub struct CommitGroup {
    pub patch_paths: Vec<PathBuf>,
    pub commit_message: String,
}

pub fn write_manifest(out_dir: &Path, groups: &[CommitGroup]) -> Result<PathBuf, DiffmuxError> {
    let path = out_dir.join("commits.json");
    let json = serde_json::to_string_pretty(groups).expect("CommitGroup always serializes");
    std::fs::write(&path, json).map_err(|source| DiffmuxError::Filesystem {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}

#[derive(Debug, Clone, Serialize)]
struct VisualizationPoint {
    id: usize,
    /// Placeholder 2D coordinates. The actual dimensionality-reduction pass
    /// that projects embeddings to a plane is an external collaborator
    /// (spec §1, §6); the core only commits to the point's shape.
    x: f32,
    y: f32,
    cluster_id: usize,
    filepath: String,
    preview: String,
}

#[derive(Debug, Clone, Serialize)]
struct VisualizationCluster {
    id: usize,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
struct Visualization {
    points: Vec<VisualizationPoint>,
    clusters: Vec<VisualizationCluster>,
}

/// Write `visualization.json` for `-i`/`--interactive` (spec §6). `x`/`y`
/// are left at `0.0`: projecting embeddings onto a plane belongs to the
/// out-of-scope visualization pass, not this pipeline. `surviving` holds
/// `(cluster_id, sub_hunk_indices, commit_message)` for clusters that
/// produced at least one patch file, so point and cluster ids agree.
pub fn write_visualization(
    out_dir: &Path,
    surviving: &[(usize, Vec<usize>, String)],
    filepaths: &[String],
    previews: &[String],
) -> Result<PathBuf, DiffmuxError> {
    let mut points = Vec::new();
    let mut clusters = Vec::new();
    for (cluster_id, idxs, message) in surviving {
        for &id in idxs {
            points.push(VisualizationPoint {
                id,
                x: 0.0,
                y: 0.0,
                cluster_id: *cluster_id,
                filepath: filepaths[id].clone(),
                preview: previews[id].clone(),
            });
        }
        clusters.push(VisualizationCluster { id: *cluster_id, message: message.clone() });
    }
    let viz = Visualization { points, clusters };

    let path = out_dir.join("visualization.json");
    let json = serde_json::to_string_pretty(&viz).expect("Visualization always serializes");
    std::fs::write(&path, json).map_err(|source| DiffmuxError::Filesystem {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}
