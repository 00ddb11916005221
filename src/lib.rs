pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod table;
pub mod utils;

// Re-export main types for easier access
pub use config::Settings;
pub use engine::{
    FanOutExecutor,
    FanOutReport,
    Task,
    TaskFailure,
    TaskResult,
    run_fan_out
};
pub use error::{UtilError, UtilResult};
pub use session::{Session, Snapshot, Variable};
pub use table::{
    Cell,
    ParallelReader,
    ReadOptions,
    Table,
    read_files
};
