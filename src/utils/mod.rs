pub mod fs;
pub mod git;
pub mod instrument;
pub mod shell;
