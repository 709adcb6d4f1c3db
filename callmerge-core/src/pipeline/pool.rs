use rayon::prelude::*;
use tracing::debug;

use crate::config::ThreadSetting;
use crate::types::CallmergeError;

/// A bounded worker pool, or inline execution on the calling thread.
#[derive(Debug)]
pub enum WorkerPool {
    Inline,
    Pool(rayon::ThreadPool),
}

impl WorkerPool {
    /// Build a pool for a `*_threads` setting. `0` runs inline.
    pub fn new(setting: ThreadSetting, name: &str) -> Result<Self, CallmergeError> {
        let workers = setting.resolve();
        if workers == 0 {
            debug!(pool = name, "running inline");
            return Ok(Self::Inline);
        }

        let prefix = name.to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |index| format!("{prefix}-{index}"))
            .build()
            .map_err(|e| {
                CallmergeError::Configuration(format!("Failed to configure {name} thread pool: {e}"))
            })?;
        debug!(pool = name, workers, "built thread pool");
        Ok(Self::Pool(pool))
    }

    /// Number of worker threads, `0` when inline.
    #[must_use]
    pub fn workers(&self) -> usize {
        match self {
            Self::Inline => 0,
            Self::Pool(pool) => pool.current_num_threads(),
        }
    }

    /// Apply `f` to every item, returning results in input order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match self {
            Self::Inline => items.iter().map(f).collect(),
            Self::Pool(pool) => pool.install(|| items.par_iter().map(f).collect()),
        }
    }
}
