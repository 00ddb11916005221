// src/engine/task.rs
use std::fmt;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use thiserror::Error;

type TaskFn<T> = Box<dyn FnOnce() -> anyhow::Result<T> + Send + 'static>;

/// A named unit of work submitted to the fan-out executor
pub struct Task<T> {
    name: String,
    func: TaskFn<T>,
}

impl<T: Send + 'static> Task<T> {
    /// Create a task from a closure that captures everything it needs
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Create a task from a function and its fixed arguments.
    ///
    /// `args` is usually a tuple; it is moved into the worker thread and
    /// handed to `func` exactly once.
    pub fn with_args<A, F>(name: impl Into<String>, func: F, args: A) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
    {
        Self::new(name, move || func(args))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, TaskFn<T>) {
        (self.name, self.func)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Why a task produced no value
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskFailure {
    #[error("task returned an error: {0}")]
    Error(String),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Status of a finished task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// Outcome of one task, paired with the name it was submitted under
#[derive(Debug)]
pub struct TaskResult<T> {
    pub name: String,
    pub outcome: Result<T, TaskFailure>,
    pub elapsed: Duration,
}

impl<T> TaskResult<T> {
    pub fn status(&self) -> TaskStatus {
        match self.outcome {
            Ok(_) => TaskStatus::Completed,
            Err(_) => TaskStatus::Failed,
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.outcome.as_ref().err()
    }
}
