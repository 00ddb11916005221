// src/engine/fanout.rs
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, debug, error};

use crate::error::{UtilResult, UtilError};
use super::task::{Task, TaskFailure, TaskResult, TaskStatus};

/// Runs every submitted task on its own OS thread and joins them all.
///
/// There is no pooling: thread count equals task count. Every child is joined
/// before `run` returns, and each one yields either a value or a typed
/// [`TaskFailure`]; the caller then picks fail-fast ([`FanOutReport::into_values`])
/// or best-effort ([`FanOutReport::into_partial`]).
#[derive(Debug)]
pub struct FanOutExecutor<T> {
    tasks: Vec<Task<T>>,
    names: HashSet<String>,
}

impl<T: Send + 'static> Default for FanOutExecutor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> FanOutExecutor<T> {
    /// Create an empty executor
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Submit a task. Names must be unique within one executor and free of NUL
    /// bytes, since they double as worker thread names.
    pub fn submit(&mut self, task: Task<T>) -> UtilResult<()> {
        if task.name().contains('\0') {
            return Err(UtilError::InvalidInput(format!("Task name contains a NUL byte: {:?}", task.name())));
        }
        if !self.names.insert(task.name().to_string()) {
            return Err(UtilError::InvalidInput(format!("Duplicate task name: {}", task.name())));
        }
        self.tasks.push(task);
        Ok(())
    }

    /// Builder form of [`submit`](Self::submit) for a closure
    pub fn task<F>(mut self, name: impl Into<String>, func: F) -> UtilResult<Self>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        self.submit(Task::new(name, func))?;
        Ok(self)
    }

    /// Builder form of [`submit`](Self::submit) for a function plus fixed arguments
    pub fn task_with_args<A, F>(mut self, name: impl Into<String>, func: F, args: A) -> UtilResult<Self>
    where
        A: Send + 'static,
        F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
    {
        self.submit(Task::with_args(name, func, args))?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawn one thread per task, then join them in submission order
    pub fn run(self) -> FanOutReport<T> {
        if self.tasks.is_empty() {
            info!("No tasks to execute");
            return FanOutReport { results: Vec::new() };
        }

        info!("Fanning out {} tasks, one thread each", self.tasks.len());

        let mut handles = Vec::with_capacity(self.tasks.len());

        for task in self.tasks {
            let (name, func) = task.into_parts();
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || Self::execute_task(func));

            match spawned {
                Ok(handle) => handles.push((name, Ok(handle), Instant::now())),
                Err(e) => {
                    error!("Failed to spawn thread for task {}: {}", name, e);
                    handles.push((name, Err(TaskFailure::Spawn(e.to_string())), Instant::now()));
                }
            }
        }

        let mut results = Vec::with_capacity(handles.len());

        for (name, handle, spawned_at) in handles {
            let (outcome, elapsed) = match handle {
                Ok(handle) => match handle.join() {
                    Ok(finished) => finished,
                    Err(payload) => (Err(TaskFailure::Panicked(panic_message(payload))), spawned_at.elapsed()),
                },
                Err(failure) => (Err(failure), Duration::ZERO),
            };

            match &outcome {
                Ok(_) => debug!("Task {} completed in {:?}", name, elapsed),
                Err(failure) => error!("Task {} failed after {:?}: {}", name, elapsed, failure),
            }

            results.push(TaskResult { name, outcome, elapsed });
        }

        let report = FanOutReport { results };
        info!(
            "Fan-out finished: {} completed, {} failed",
            report.successes().count(),
            report.failures().count()
        );
        report
    }

    fn execute_task(func: Box<dyn FnOnce() -> anyhow::Result<T> + Send>) -> (Result<T, TaskFailure>, Duration) {
        let start_time = Instant::now();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(func)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TaskFailure::Error(format!("{:#}", e))),
            Err(payload) => Err(TaskFailure::Panicked(panic_message(payload))),
        };
        (outcome, start_time.elapsed())
    }
}

/// Results of one fan-out, in submission order
#[derive(Debug)]
pub struct FanOutReport<T> {
    results: Vec<TaskResult<T>>,
}

impl<T> FanOutReport<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskResult<T>> {
        self.results.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.name.as_str())
    }

    pub fn successes(&self) -> impl Iterator<Item = &TaskResult<T>> {
        self.results.iter().filter(|r| r.outcome.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskResult<T>> {
        self.results.iter().filter(|r| r.outcome.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_ok())
    }

    pub fn status_of(&self, name: &str) -> Option<TaskStatus> {
        self.results.iter().find(|r| r.name == name).map(TaskResult::status)
    }

    /// Fail-fast view: every value, or the first failure in submission order
    pub fn into_values(self) -> UtilResult<Vec<(String, T)>> {
        self.results
            .into_iter()
            .map(|r| match r.outcome {
                Ok(value) => Ok((r.name, value)),
                Err(failure) => Err(UtilError::WorkerFailure {
                    task: r.name,
                    message: failure.to_string(),
                }),
            })
            .collect()
    }

    /// Best-effort view: values and failures split apart, order preserved
    pub fn into_partial(self) -> (Vec<(String, T)>, Vec<(String, TaskFailure)>) {
        let mut values = Vec::new();
        let mut failures = Vec::new();
        for r in self.results {
            match r.outcome {
                Ok(value) => values.push((r.name, value)),
                Err(failure) => failures.push((r.name, failure)),
            }
        }
        (values, failures)
    }
}

impl<T> IntoIterator for FanOutReport<T> {
    type Item = TaskResult<T>;
    type IntoIter = std::vec::IntoIter<TaskResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

/// Run the given tasks and return `(name, value)` pairs, failing on the first error
pub fn run_fan_out<T, I>(tasks: I) -> UtilResult<Vec<(String, T)>>
where
    T: Send + 'static,
    I: IntoIterator<Item = Task<T>>,
{
    let mut executor = FanOutExecutor::new();
    for task in tasks {
        executor.submit(task)?;
    }
    executor.run().into_values()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
