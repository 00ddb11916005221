mod format;
mod frame;
mod reader;

pub use format::{read_table, write_table, Compression, FileFormat, ReadOptions, WriteOptions};
pub use frame::{Cell, Table};
pub use reader::{expand_pattern, partition, read_files, read_paths, FileBatch, ParallelReader};
