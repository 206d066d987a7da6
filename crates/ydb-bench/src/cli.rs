use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(version, about, long_about=None)]
pub struct CliOpts {
    #[arg(
        long,
        value_enum,
        env = "TRACING_LEVEL",
        default_value = "info",
        help = "Tracing level, it can be overrided by *RUST_LOG* env var"
    )]
    pub tracing_level: TracingLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a test plan and print the bound parameters of every query
    Check {
        #[arg(
            short,
            long,
            env = "YDB_BENCH_PLAN",
            help = "Path to the YAML test plan"
        )]
        plan: PathBuf,
    },
    /// List the parameter type tags accepted in queryArgumentsTypes
    Types,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum TracingLevel {
    Off,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<TracingLevel> for LevelFilter {
    fn from(level: TracingLevel) -> Self {
        match level {
            TracingLevel::Off => Self::OFF,
            TracingLevel::Warn => Self::WARN,
            TracingLevel::Info => Self::INFO,
            TracingLevel::Debug => Self::DEBUG,
            TracingLevel::Trace => Self::TRACE,
        }
    }
}
