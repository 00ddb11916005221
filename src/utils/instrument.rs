//! Explicit wrappers for timing, profiling, timeouts and background dispatch.
//!
//! Each helper takes a callable and either runs it with the extra behaviour or
//! returns an instrumented callable; nothing is attached implicitly.

use std::collections::HashMap;
use std::future::Future;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use prettytable::{format, row, Table};
use tracing::{info, debug, warn};

use crate::error::{UtilResult, UtilError};

/// Run `func`, log how long it took and return its value with the duration
pub fn timed<T>(label: &str, func: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = func();
    let elapsed = start.elapsed();
    info!("function {} finished in: {:.2} s", label, elapsed.as_secs_f64());
    (value, elapsed)
}

/// Wrap `func` so that every call is timed under `label`
pub fn timed_fn<A, T, F>(label: impl Into<String>, func: F) -> impl Fn(A) -> T
where
    F: Fn(A) -> T,
{
    let label = label.into();
    move |args| timed(&label, || func(args)).0
}

/// Accumulated timings for one label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallStats {
    pub calls: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl CallStats {
    fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(self.total.as_secs_f64() / self.calls as f64)
        }
    }
}

/// Collects per-label call statistics from scopes and profiled calls
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    stats: Arc<Mutex<HashMap<String, CallStats>>>,
}

static GLOBAL_PROFILER: Lazy<Profiler> = Lazy::new(Profiler::new);

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide profiler
    pub fn global() -> &'static Profiler {
        &GLOBAL_PROFILER
    }

    /// Start a scope that is recorded under `label` when dropped
    pub fn scope(&self, label: impl Into<String>) -> ProfileScope<'_> {
        ProfileScope {
            profiler: self,
            label: label.into(),
            start: Instant::now(),
        }
    }

    /// Run `func` inside a scope named `label`
    pub fn profiled<T>(&self, label: &str, func: impl FnOnce() -> T) -> T {
        let _scope = self.scope(label);
        func()
    }

    pub fn record(&self, label: &str, elapsed: Duration) {
        let mut stats = self.stats.lock();
        stats
            .entry(label.to_string())
            .or_insert(CallStats {
                calls: 0,
                total: Duration::ZERO,
                min: Duration::MAX,
                max: Duration::ZERO,
            })
            .record(elapsed);
    }

    pub fn stats(&self, label: &str) -> Option<CallStats> {
        self.stats.lock().get(label).copied()
    }

    pub fn reset(&self) {
        self.stats.lock().clear();
    }

    /// Render all labels sorted by cumulative time, slowest first
    pub fn report(&self) -> String {
        let mut rows: Vec<(String, CallStats)> = self.stats
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(&b.0)));

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.set_titles(row!["Label", "Calls", "Total (s)", "Mean (s)", "Max (s)"]);
        for (label, s) in rows {
            table.add_row(row![
                label,
                s.calls,
                format!("{:.6}", s.total.as_secs_f64()),
                format!("{:.6}", s.mean().as_secs_f64()),
                format!("{:.6}", s.max.as_secs_f64())
            ]);
        }
        table.to_string()
    }
}

/// Guard returned by [`Profiler::scope`]
pub struct ProfileScope<'a> {
    profiler: &'a Profiler,
    label: String,
    start: Instant,
}

impl Drop for ProfileScope<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        debug!("scope {} took {:?}", self.label, elapsed);
        self.profiler.record(&self.label, elapsed);
    }
}

/// Await `future`, failing with `TimeoutError` once `duration` passes
pub async fn with_timeout<F: Future>(operation: &str, duration: Duration, future: F) -> UtilResult<F::Output> {
    tokio::time::timeout(duration, future).await.map_err(|_| {
        warn!("{} timed out after {:?}", operation, duration);
        UtilError::TimeoutError {
            operation: operation.to_string(),
            seconds: duration.as_secs(),
        }
    })
}

/// Run a blocking `func` on a worker thread and wait at most `duration` for it.
///
/// On timeout the worker is left to finish in the background; its result is discarded.
pub fn run_with_timeout<T, F>(operation: &str, duration: Duration, func: F) -> UtilResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    spawn_background(operation, move || {
        let _ = tx.send(func());
    })?;

    match rx.recv_timeout(duration) {
        Ok(value) => Ok(value),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!("{} timed out after {:?}", operation, duration);
            Err(UtilError::TimeoutError {
                operation: operation.to_string(),
                seconds: duration.as_secs(),
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(UtilError::WorkerFailure {
            task: operation.to_string(),
            message: "worker exited without a result".to_string(),
        }),
    }
}

/// Start `func` on a named background thread and return its handle
pub fn spawn_background<T, F>(name: &str, func: F) -> UtilResult<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    if name.contains('\0') {
        return Err(UtilError::InvalidInput(format!("Thread name contains a NUL byte: {:?}", name)));
    }
    debug!("Starting background thread {}", name);
    thread::Builder::new()
        .name(name.to_string())
        .spawn(func)
        .map_err(|e| UtilError::WorkerFailure {
            task: name.to_string(),
            message: format!("Failed to spawn thread: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_returns_value_and_duration() {
        let (value, elapsed) = timed("sleepy", || {
            thread::sleep(Duration::from_millis(20));
            7
        });
        assert_eq!(value, 7);
        assert!(elapsed >= Duration::from_millis(20));

        let square = timed_fn("square", |x: i32| x * x);
        assert_eq!(square(9), 81);
    }

    #[test]
    fn test_profiler_accumulates() {
        let profiler = Profiler::new();
        let total = profiler.profiled("sum", || (0..100_000u64).sum::<u64>());
        assert_eq!(total, 4_999_950_000);
        {
            let _scope = profiler.scope("sum");
        }

        let stats = profiler.stats("sum").unwrap();
        assert_eq!(stats.calls, 2);
        assert!(stats.min <= stats.max);
        assert!(profiler.report().contains("sum"));

        profiler.reset();
        assert!(profiler.stats("sum").is_none());
    }

    #[test]
    fn test_blocking_timeout() {
        let ok = run_with_timeout("quick", Duration::from_secs(5), || 1).unwrap();
        assert_eq!(ok, 1);

        let err = run_with_timeout("slow", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
        }).unwrap_err();
        assert!(matches!(err, UtilError::TimeoutError { .. }));
    }

    #[tokio::test]
    async fn test_async_timeout() {
        let value = with_timeout("fast", Duration::from_secs(1), async { 3 }).await.unwrap();
        assert_eq!(value, 3);

        let err = with_timeout("slow", Duration::from_millis(10), tokio::time::sleep(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, UtilError::TimeoutError { .. }));
    }

    #[test]
    fn test_spawn_background() {
        let handle = spawn_background("bg", || 5).unwrap();
        assert_eq!(handle.thread().name(), Some("bg"));
        assert_eq!(handle.join().unwrap(), 5);

        let err = spawn_background("bad\0name", || ()).unwrap_err();
        assert!(matches!(err, UtilError::InvalidInput(_)));
    }
}
