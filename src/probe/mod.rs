// FILE: src/probe/mod.rs
pub mod command;
pub mod parser;
pub mod runner;

pub use command::{build_probe_command, ProbeBatch};
pub use parser::{parse_probe_output, ProbeRecord};
pub use runner::{ProbeFuture, ProbeOutput, ProbeRunner, ShellProbeRunner};
