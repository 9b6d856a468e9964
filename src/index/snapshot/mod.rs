// Arrow IPC snapshot of the vector index
// One row per vector: `vector_id` (u64 position) and `vector` (fixed-size f32 list)


use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use tracing::{debug, error, warn};

use crate::{NexusError, Result};

const ID_COLUMN: &str = "vector_id";
const VECTOR_COLUMN: &str = "vector";
const BACKUP_SUFFIX: &str = "corrupted_backup";

fn item_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, false))
}

fn snapshot_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new(ID_COLUMN, DataType::UInt64, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(item_field(), dimension),
            false,
        ),
    ])
}

fn list_width(dimension: usize) -> Result<i32> {
    i32::try_from(dimension)
        .map_err(|_| NexusError::Snapshot(format!("Dimension {dimension} is too large")))
}

/// Atomically replace the snapshot at `path` with `vectors` (row-major, `dimension` wide).
///
/// The batch is written to a sibling temp file and renamed over the target so a
/// crash mid-write leaves the previous snapshot intact.
#[inline]
pub fn write_snapshot(path: &Path, dimension: usize, vectors: &[f32]) -> Result<()> {
    if dimension == 0 || vectors.len() % dimension != 0 {
        return Err(NexusError::Snapshot(format!(
            "Buffer of {} floats is not a whole number of {}-wide vectors",
            vectors.len(),
            dimension
        )));
    }

    let width = list_width(dimension)?;
    let rows = vectors.len() / dimension;
    let schema = Arc::new(snapshot_schema(width));

    let to_snapshot_error = |e: ArrowError| NexusError::Snapshot(e.to_string());

    let ids = UInt64Array::from_iter_values(0..rows as u64);
    let values = Float32Array::from(vectors.to_vec());
    let list = FixedSizeListArray::try_new(item_field(), width, Arc::new(values), None)
        .map_err(to_snapshot_error)?;
    let batch = RecordBatch::try_new(Arc::clone(&schema), vec![Arc::new(ids), Arc::new(list)])
        .map_err(to_snapshot_error)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = sibling_path(path, "tmp");
    {
        let file = File::create(&temp_path)?;
        let mut writer = FileWriter::try_new(file, &schema).map_err(to_snapshot_error)?;
        writer.write(&batch).map_err(to_snapshot_error)?;
        writer.finish().map_err(to_snapshot_error)?;
    }
    fs::rename(&temp_path, path)?;

    debug!("Wrote snapshot of {} vectors to {}", rows, path.display());
    Ok(())
}

/// Read every vector from the snapshot at `path` into one row-major buffer.
///
/// Fails with [`NexusError::IndexUnavailable`] when the file is not a valid
/// snapshot, holds vectors of a different dimension, or has gaps in its ids.
#[inline]
pub fn read_snapshot(path: &Path, dimension: usize) -> Result<Vec<f32>> {
    let unavailable = |reason: String| {
        NexusError::IndexUnavailable(format!("Snapshot {} {}", path.display(), reason))
    };

    let file = File::open(path).map_err(|e| unavailable(format!("cannot be opened: {e}")))?;
    let reader =
        FileReader::try_new(file, None).map_err(|e| unavailable(format!("is unreadable: {e}")))?;

    let mut vectors = Vec::new();
    let mut next_id: u64 = 0;

    for batch in reader {
        let batch = batch.map_err(|e| unavailable(format!("has a corrupt batch: {e}")))?;

        let ids = batch
            .column_by_name(ID_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
            .ok_or_else(|| unavailable(format!("has no '{ID_COLUMN}' column")))?;
        let list = batch
            .column_by_name(VECTOR_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| unavailable(format!("has no '{VECTOR_COLUMN}' column")))?;

        if usize::try_from(list.value_length()).ok() != Some(dimension) {
            return Err(unavailable(format!(
                "stores {}-dimensional vectors but {} are configured",
                list.value_length(),
                dimension
            )));
        }
        if ids.null_count() > 0 || list.null_count() > 0 {
            return Err(unavailable("contains null rows".to_string()));
        }

        for row in 0..list.len() {
            if ids.value(row) != next_id {
                return Err(unavailable(format!(
                    "expected vector id {} but found {}",
                    next_id,
                    ids.value(row)
                )));
            }

            let row_values = list.value(row);
            let floats = row_values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| unavailable("stores non-f32 vectors".to_string()))?;
            vectors.extend_from_slice(floats.values());
            next_id += 1;
        }
    }

    debug!("Read {} vectors from {}", next_id, path.display());
    Ok(vectors)
}

/// Move an unreadable snapshot aside so the next persist does not overwrite it
#[inline]
pub fn quarantine(path: &Path) -> Option<PathBuf> {
    let backup_path = sibling_path(path, BACKUP_SUFFIX);

    match fs::rename(path, &backup_path) {
        Ok(()) => {
            warn!(
                "Moved unreadable snapshot to {}",
                backup_path.display()
            );
            Some(backup_path)
        }
        Err(e) => {
            error!(
                "Failed to move unreadable snapshot {} aside: {}",
                path.display(),
                e
            );
            None
        }
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
