//! clang-analyze CLI binary entry point.
//! Resolves settings, runs the analyzer and prints results.

use clang_analyze::analyzer::{AnalyzeOptions, Analyzer, RunState};
use clang_analyze::cli::{Cli, Commands};
use clang_analyze::errors::AnalyzeError;
use clang_analyze::{config, output, utils};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

fn init_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", utils::error_prefix(), msg);
    std::process::exit(2);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Init { path, dir, force } => {
            let p = Path::new(&path);
            if let Err(e) = config::write_starter(p, &dir, force) {
                fail(e);
            }
            println!("created: {}", p.display());
        }
        Commands::Profiles {
            root,
            config: cfg,
            output: out,
        } => {
            let eff = match config::resolve_effective(
                root.as_deref(),
                cfg.as_deref(),
                None,
                &[],
                None,
                None,
                out.as_deref(),
            ) {
                Ok(eff) => eff,
                Err(e) => fail(e),
            };
            if eff.profiles.is_empty() {
                eprintln!("{} {}", utils::note_prefix(), "No profiles configured.");
            }
            output::print_profiles(&eff.profiles, &eff.output);
        }
        Commands::Analyze {
            root,
            config: cfg,
            dir,
            profiles,
            tool,
            jobs,
            output: out,
            select,
        } => {
            let eff = match config::resolve_effective(
                root.as_deref(),
                cfg.as_deref(),
                dir.as_deref(),
                &profiles,
                tool.as_deref(),
                jobs,
                out.as_deref(),
            ) {
                Ok(eff) => eff,
                Err(e) => fail(e),
            };
            if eff.config_path.is_none() {
                eprintln!(
                    "{} {}",
                    utils::note_prefix(),
                    format!(
                        "No clang-analyze settings file found in {}; using CLI flags and defaults.",
                        eff.root.display()
                    )
                );
            }
            if eff.profiles.is_empty() {
                eprintln!(
                    "{} {}",
                    utils::note_prefix(),
                    "No profiles configured; nothing will be analyzed."
                );
            }
            if eff.output != "json" {
                eprintln!(
                    "{} {}",
                    utils::info_prefix(),
                    format!(
                        "Analyzing {} with {}",
                        eff.analyze_directory.display(),
                        eff.command
                    )
                );
            }

            let analyzer = Arc::new(Analyzer::new(AnalyzeOptions::from(&eff)));
            let reporter = Arc::new(output::ProgressReporter::new(
                cli.quiet || eff.output == "json",
            ));
            let sink = reporter.clone();
            let handle = analyzer.spawn(move |p| sink.report(p));
            let result = handle.join();
            reporter.finish();

            let outcome = match result {
                Ok(o) => o,
                Err(e @ AnalyzeError::DirectoryNotFound(_)) => fail(format!(
                    "{} (set analyzeDirectory or pass --dir)",
                    e
                )),
                Err(e @ AnalyzeError::ToolLaunchFailure { .. }) => {
                    fail(format!("{} (set tool.command or pass --tool)", e))
                }
                Err(e) => fail(e),
            };

            if let Some(sel) = select.as_deref() {
                if !output::print_selection(&outcome.tree, sel) {
                    eprintln!(
                        "{} {}",
                        utils::note_prefix(),
                        format!("No diagnostics under {}", sel)
                    );
                }
            } else {
                output::print_outcome(&outcome, &eff.output);
            }

            if outcome.state == RunState::Cancelled {
                std::process::exit(130);
            }
            let summary = outcome.summary();
            if summary.errors > 0 || summary.command_errors > 0 {
                std::process::exit(1);
            }
        }
    }
}
