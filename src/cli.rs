//! CLI argument parsing via `clap`.

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "clang-analyze",
    version,
    about = "Run the clang static analyzer over a source tree",
    long_about = "clang-analyze — run the clang static analyzer over every source file under a directory, once per configured profile, and collect the deduplicated diagnostics as a folder/file tree.\n\nConfiguration precedence: CLI > clang-analyze.toml > defaults.",
    after_help = "Examples:\n  clang-analyze init --dir src\n  clang-analyze analyze\n  clang-analyze analyze --profile x64 --jobs 4 --output json\n  clang-analyze analyze --select C:/work/src/net",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[arg(short, long, global = true, action = ArgAction::Count, help = "More log output (-v debug, -vv trace)")]
    pub verbose: u8,
    #[arg(short, long, global = true, action = ArgAction::SetTrue, help = "Only log errors and hide the progress bar")]
    pub quiet: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current clang-analyze version.")]
    Version,
    /// Analyze all sources under every profile
    #[command(
        about = "Run the analyzer",
        long_about = "Invoke the analyzer once per (profile, source file) pair and print the collected diagnostics. Exits 1 when errors were reported, 2 when the run could not start.",
        after_help = "Examples:\n  clang-analyze analyze\n  clang-analyze analyze --dir ../engine --profile x86 --profile x64\n  clang-analyze analyze --output json"
    )]
    Analyze {
        #[arg(long, help = "Working root used for settings discovery (default: current dir)")]
        root: Option<String>,
        #[arg(long, help = "Explicit settings file (toml|yaml|json)")]
        config: Option<String>,
        #[arg(long, help = "Directory to analyze (overrides analyzeDirectory)")]
        dir: Option<String>,
        #[arg(long = "profile", help = "Only run the named profile (repeatable)")]
        profiles: Vec<String>,
        #[arg(long, help = "Analyzer executable (overrides tool.command)")]
        tool: Option<String>,
        #[arg(long, help = "Files analyzed in parallel per profile (default: 1)")]
        jobs: Option<usize>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Print only the diagnostics under this file or folder path")]
        select: Option<String>,
    },
    /// List configured profiles
    #[command(
        about = "List profiles",
        long_about = "Print every profile with its bit width and extra analyzer options."
    )]
    Profiles {
        #[arg(long, help = "Working root used for settings discovery (default: current dir)")]
        root: Option<String>,
        #[arg(long, help = "Explicit settings file (toml|yaml|json)")]
        config: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Write a starter settings file
    #[command(
        about = "Create clang-analyze.toml",
        long_about = "Write a starter settings file with two profiles. Refuses to overwrite an existing file unless --force is given."
    )]
    Init {
        #[arg(long, default_value = "clang-analyze.toml", help = "Settings file to create")]
        path: String,
        #[arg(long, default_value = "src", help = "Directory to analyze")]
        dir: String,
        #[arg(long, action = ArgAction::SetTrue, help = "Overwrite an existing file")]
        force: bool,
    },
}
