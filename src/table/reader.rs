// src/table/reader.rs
use std::path::{Path, PathBuf};
use rayon::prelude::*;
use tracing::{info, debug};

use crate::config;
use crate::error::{UtilResult, UtilError};
use super::format::{read_table, ReadOptions};
use super::frame::Table;

/// Files assigned to a single worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBatch {
    pub paths: Vec<PathBuf>,
}

impl FileBatch {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Parse every file in the batch and stack them
    pub fn read(&self, options: &ReadOptions) -> UtilResult<Table> {
        let tables = self.paths
            .iter()
            .map(|path| read_table(path, options))
            .collect::<UtilResult<Vec<_>>>()?;
        Ok(Table::concat(tables))
    }
}

/// Expand a glob pattern into a sorted list of files
pub fn expand_pattern(pattern: &str) -> UtilResult<Vec<PathBuf>> {
    let entries = glob::glob(pattern)
        .map_err(|e| UtilError::InvalidInput(format!("Invalid pattern {}: {}", pattern, e)))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| UtilError::PathError {
            path: e.path().to_path_buf(),
            message: e.error().to_string(),
        })?;
        if path.is_file() {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        return Err(UtilError::EmptyResult { pattern: pattern.to_string() });
    }

    paths.sort();
    Ok(paths)
}

/// Split `paths` into at most `pool_size` contiguous, disjoint batches.
///
/// A pool size of 0 counts as 1, and the worker count never exceeds the file
/// count, so no batch is ever empty.
pub fn partition(paths: Vec<PathBuf>, pool_size: usize) -> Vec<FileBatch> {
    if paths.is_empty() {
        return Vec::new();
    }

    let workers = pool_size.clamp(1, paths.len());
    let base = paths.len() / workers;
    let extra = paths.len() % workers;

    let mut batches = Vec::with_capacity(workers);
    let mut remaining = paths.into_iter();
    for i in 0..workers {
        let size = base + usize::from(i < extra);
        batches.push(FileBatch { paths: remaining.by_ref().take(size).collect() });
    }
    batches
}

/// Reads many files matched by one pattern on a dedicated worker pool
#[derive(Debug, Clone)]
pub struct ParallelReader {
    pool_size: usize,
    options: ReadOptions,
}

impl Default for ParallelReader {
    fn default() -> Self {
        let reader = &config::settings().reader;
        Self {
            pool_size: reader.effective_pool_size(),
            options: ReadOptions {
                has_headers: reader.has_headers,
                ..ReadOptions::default()
            },
        }
    }
}

impl ParallelReader {
    pub fn new(pool_size: usize, options: ReadOptions) -> Self {
        Self { pool_size, options }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Expand `pattern` and read every matching file
    pub fn read(&self, pattern: &str) -> UtilResult<Table> {
        let paths = expand_pattern(pattern)?;
        info!("Pattern {} matched {} files", pattern, paths.len());
        self.read_paths(paths)
    }

    /// Read an explicit list of files
    pub fn read_paths(&self, paths: Vec<PathBuf>) -> UtilResult<Table> {
        if paths.is_empty() {
            return Err(UtilError::InvalidInput("No paths to read".to_string()));
        }

        let batches = partition(paths, self.pool_size);
        let workers = batches.len();
        debug!("Reading {} batches with {} workers (requested {})", workers, workers, self.pool_size);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("parutil-reader-{}", i))
            .build()
            .map_err(|e| UtilError::ConfigError(format!("Failed to create thread pool: {}", e)))?;

        let options = &self.options;
        // Collecting into a Result keeps partition order and stops at the first failure
        let parts = pool.install(|| {
            batches
                .par_iter()
                .map(|batch| batch.read(options))
                .collect::<UtilResult<Vec<_>>>()
        })?;

        let combined = Table::concat(parts);
        info!("Combined table has {} rows x {} columns", combined.n_rows(), combined.n_cols());
        Ok(combined)
    }
}

/// Read every file matching `pattern` in parallel and concatenate the results.
///
/// `pool_size` of `None` uses the configured default.
pub fn read_files(pattern: &str, pool_size: Option<usize>, options: &ReadOptions) -> UtilResult<Table> {
    let pool_size = pool_size.unwrap_or_else(|| config::settings().reader.effective_pool_size());
    ParallelReader::new(pool_size, options.clone()).read(pattern)
}

/// Convenience for reading paths that are already known
pub fn read_paths(paths: &[&Path], pool_size: usize, options: &ReadOptions) -> UtilResult<Table> {
    ParallelReader::new(pool_size, options.clone())
        .read_paths(paths.iter().map(|p| p.to_path_buf()).collect())
}
