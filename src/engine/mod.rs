mod fanout;
mod task;

pub use fanout::{FanOutExecutor, FanOutReport, run_fan_out};
pub use task::{Task, TaskFailure, TaskResult, TaskStatus};
