//! The unit of work executed on a worker thread.

use terrane_rtin::{MeshOptions, Rtin, RtinError, TerrainMesh};
use terrane_tiles::{DecodeError, decode_terrain_rgb};

/// Request: simplify an encoded elevation raster at a given error threshold.
#[derive(Clone, Debug)]
pub struct SimplifyJob {
    /// Correlation key chosen by the submitter.
    pub key: u64,
    /// Encoded terrain-RGB raster (PNG or any format the decoder accepts).
    pub raster: Vec<u8>,
    pub error_threshold: f32,
}

/// Response for one job. `outcome` is the distinguishable error response on failure.
#[derive(Debug)]
pub struct JobResult {
    pub key: u64,
    pub outcome: Result<TerrainMesh, WorkerError>,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to decode elevation raster: {0}")]
    Decode(#[from] DecodeError),

    #[error("simplification failed: {0}")]
    Simplify(#[from] RtinError),

    #[error("worker panicked: {0}")]
    Panicked(String),

    /// The worker thread is gone and cannot accept the job.
    #[error("worker {0} is not running")]
    Disconnected(usize),
}

/// Decode `job.raster` and simplify it with `rtin`. Runs synchronously.
pub fn simplify_raster(
    job: &SimplifyJob,
    rtin: &Rtin,
    options: &MeshOptions,
) -> Result<TerrainMesh, WorkerError> {
    let grid = decode_terrain_rgb(&job.raster, rtin.tile_size() as u32)?;
    let tile = rtin.create_tile(&grid)?;
    let mesh = tile.mesh(job.error_threshold);
    Ok(TerrainMesh::from_rtin(mesh, &grid, options))
}

#[cfg(test)]
mod tests {
    use terrane_tiles::encode_terrain_rgb;

    use super::*;

    fn job(raster: Vec<u8>, error_threshold: f32) -> SimplifyJob {
        SimplifyJob {
            key: 1,
            raster,
            error_threshold,
        }
    }

    #[test]
    fn test_flat_raster_collapses_to_two_triangles() {
        let rtin = Rtin::new(17).unwrap();
        let raster = encode_terrain_rgb(16, |_, _| 250.0).unwrap();
        let mesh = simplify_raster(&job(raster, 1.0), &rtin, &MeshOptions::default()).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
        let (lo, hi) = mesh.height_range();
        assert!((lo - 250.0).abs() < 0.1 && (hi - 250.0).abs() < 0.1);
    }

    /// A zero threshold over curved terrain keeps every grid vertex.
    #[test]
    fn test_zero_threshold_keeps_full_grid() {
        let rtin = Rtin::new(9).unwrap();
        let raster = encode_terrain_rgb(8, |x, y| {
            let (dx, dy) = (x as f32 - 3.5, y as f32 - 3.5);
            (dx * dx + dy * dy) * 10.0
        })
        .unwrap();
        let mesh = simplify_raster(&job(raster, 0.0), &rtin, &MeshOptions::default()).unwrap();
        assert_eq!(mesh.vertex_count(), 81);
        assert_eq!(mesh.triangle_count(), 128);
    }

    /// Rasters larger than the tile are resampled to fit the grid.
    #[test]
    fn test_oversized_raster_is_resampled() {
        let rtin = Rtin::new(17).unwrap();
        let raster = encode_terrain_rgb(64, |_, _| 0.0).unwrap();
        assert!(simplify_raster(&job(raster, 1.0), &rtin, &MeshOptions::default()).is_ok());
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let rtin = Rtin::new(17).unwrap();
        let result = simplify_raster(&job(vec![1, 2, 3], 1.0), &rtin, &MeshOptions::default());
        assert!(matches!(result, Err(WorkerError::Decode(_))));
    }
}
