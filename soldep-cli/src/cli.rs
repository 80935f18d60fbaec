use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "soldep",
    about = "resolve, cache, and flatten Solidity import graphs",
    version,
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// Entry source file to resolve and flatten
    pub entry: String,

    /// Write the flattened source to a file instead of stdout
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Add an import remapping; repeatable
    #[arg(short = 'r', long = "remap", value_name = "FROM=TO")]
    pub remap: Vec<String>,

    /// Read remappings from a line-oriented file
    #[arg(short = 'R', long = "remappings-file", value_name = "FILE")]
    pub remappings_file: Option<PathBuf>,

    /// Override the hoisted `pragma solidity` range
    #[arg(long = "pragma", value_name = "RANGE")]
    pub pragma: Option<String>,

    /// Run as if started in this directory
    #[arg(long = "cwd", value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Verbose tracing output
    #[arg(long = "debug")]
    pub debug: bool,
}
