//! Durable per-genome checkpoints.
//!
//! Each genome has its own `<checkpoint_dir>/<genome>.checkpoint.json`, so
//! writes for different genomes never contend. Updates go through a temp
//! file that is synced and renamed over the previous checkpoint; a crash
//! leaves either the old or the new stage on disk, never a torn file.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Stage;
use crate::constants::CHECKPOINT_SUFFIX;
use crate::types::{CallmergeError, GenomeDescriptor};

/// Checkpoint file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub genome: String,
    pub stage: Stage,
    pub updated_at: DateTime<Utc>,
}

/// Exclusive right to move one genome's checkpoint.
///
/// Released on drop.
#[derive(Debug)]
pub struct GenomeLease {
    genome: String,
    flag: Arc<AtomicBool>,
}

impl GenomeLease {
    #[must_use]
    pub fn genome(&self) -> &str {
        &self.genome
    }
}

impl Drop for GenomeLease {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Reads and writes checkpoint files and gates transitions per genome.
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    in_flight: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl CheckpointStore {
    /// Open (creating if needed) a checkpoint directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CallmergeError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            CallmergeError::Checkpoint(format!("cannot create {}: {e}", dir.display()))
        })?;
        Ok(Self {
            dir,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, genome: &str) -> PathBuf {
        self.dir.join(format!("{genome}.{CHECKPOINT_SUFFIX}"))
    }

    /// The stored record for a genome, if one was ever written.
    pub fn record(&self, genome: &str) -> Result<Option<CheckpointRecord>, CallmergeError> {
        let path = self.path_for(genome);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: CheckpointRecord = serde_json::from_str(&text).map_err(|e| {
            CallmergeError::Checkpoint(format!("corrupt checkpoint {}: {e}", path.display()))
        })?;
        if record.genome != genome {
            return Err(CallmergeError::Checkpoint(format!(
                "{} belongs to genome '{}'",
                path.display(),
                record.genome
            )));
        }
        Ok(Some(record))
    }

    /// Furthest completed stage, `PENDING` if no checkpoint exists.
    pub fn load(&self, genome: &str) -> Result<Stage, CallmergeError> {
        Ok(self.record(genome)?.map_or(Stage::Pending, |record| record.stage))
    }

    /// Recorded stage of every genome, keyed by name.
    pub fn snapshot(
        &self,
        genomes: &[GenomeDescriptor],
    ) -> Result<BTreeMap<String, Stage>, CallmergeError> {
        genomes
            .iter()
            .map(|genome| Ok((genome.name.clone(), self.load(&genome.name)?)))
            .collect()
    }

    /// Claim the single in-flight transition slot for a genome.
    ///
    /// # Errors
    ///
    /// [`CallmergeError::TransitionInFlight`] if another transition holds the slot.
    pub fn lease(&self, genome: &str) -> Result<GenomeLease, CallmergeError> {
        let flag = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(in_flight.entry(genome.to_string()).or_default())
        };
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CallmergeError::TransitionInFlight(genome.to_string()))?;
        Ok(GenomeLease {
            genome: genome.to_string(),
            flag,
        })
    }

    /// Durably record that the leased genome completed `stage`.
    ///
    /// # Errors
    ///
    /// [`CallmergeError::Checkpoint`] if `stage` is not ahead of the stored
    /// stage; checkpoints never move backwards.
    pub fn advance(&self, lease: &GenomeLease, stage: Stage) -> Result<(), CallmergeError> {
        let current = self.load(&lease.genome)?;
        if stage <= current {
            return Err(CallmergeError::Checkpoint(format!(
                "refusing to move genome {} from {current} to {stage}",
                lease.genome
            )));
        }

        let record = CheckpointRecord {
            genome: lease.genome.clone(),
            stage,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&record)?;
        write_atomic(&self.path_for(&lease.genome), &json)?;
        info!(genome = %lease.genome, from = %current, to = %stage, "checkpoint advanced");
        Ok(())
    }
}

/// Replace `path` with `contents` through a synced temp file and a rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", path.display()),
        )
    })?;
    let temp = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));

    {
        let mut file = File::create(&temp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&temp, path)?;

    #[cfg(unix)]
    File::open(dir)?.sync_all()?;

    debug!(path = %path.display(), bytes = contents.len(), "wrote file atomically");
    Ok(())
}
