//! Analysis orchestration across (profile × file) units.
//!
//! A run discovers source files under the analyze directory, invokes the
//! external analyzer once per unit, feeds the combined output through the
//! line parser and builds a deduplicated [`ResultTree`]. Progress is reported
//! as a percentage after every unit; cancellation is checked before each unit
//! starts, never in the middle of one.
//!
//! With `jobs > 1` the files of one profile are analyzed in parallel, but tool
//! outputs are applied to the tree strictly in file order under a single lock,
//! so the resulting tree is the same as a sequential run.

use crate::config::{Effective, Profile};
use crate::dedup::Deduplicator;
use crate::errors::AnalyzeError;
use crate::models::{DiagnosticNode, ResultTree, Summary};
use crate::parser::{self, ParsedLine};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// Lifecycle of an [`Analyzer`].
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Default)]
/// Cooperative cancellation flag shared with a running analysis.
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One analyzer command line.
pub struct Invocation {
    pub program: String,
    /// Whitespace-joined argument string.
    pub command_line: String,
}

impl Invocation {
    /// Assemble `<base args> <profile options> <file>`.
    pub fn build(program: &str, base_args: &[String], profile: &Profile, file: &Path) -> Self {
        let mut parts: Vec<String> = base_args.to_vec();
        parts.extend(profile.options.iter().cloned());
        parts.push(file.to_string_lossy().to_string());
        Self {
            program: program.to_string(),
            command_line: parts.join(" "),
        }
    }

    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.command_line.split_whitespace()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Captured result of one analyzer process.
pub struct ToolOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut s = String::with_capacity(self.stdout.len() + self.stderr.len());
        s.push_str(&self.stdout);
        s.push_str(&self.stderr);
        s
    }
}

/// Executes analyzer invocations. Implementations must drain all output
/// before returning.
pub trait ToolRunner: Sync {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Runs the analyzer as a child process.
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput> {
        let out = Command::new(&invocation.program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .output()?;
        Ok(ToolOutput {
            status: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Clone)]
/// What the analyzer needs from the settings collaborator.
pub struct AnalyzeOptions {
    pub analyze_directory: PathBuf,
    pub profiles: Vec<Profile>,
    pub command: String,
    pub base_args: Vec<String>,
    pub extension: String,
    pub jobs: usize,
}

impl From<&Effective> for AnalyzeOptions {
    fn from(eff: &Effective) -> Self {
        Self {
            analyze_directory: eff.analyze_directory.clone(),
            profiles: eff.profiles.clone(),
            command: eff.command.clone(),
            base_args: eff.base_args.clone(),
            extension: eff.extension.clone(),
            jobs: eff.jobs,
        }
    }
}

#[derive(Debug, Clone)]
/// Result handed to the caller once a run stops.
pub struct RunOutcome {
    /// `Completed` or `Cancelled`.
    pub state: RunState,
    pub tree: ResultTree,
    /// `[<profile>] ...` entries not tied to a source position.
    pub command_errors: Vec<String>,
    pub units_total: usize,
    pub units_done: usize,
}

impl RunOutcome {
    pub fn summary(&self) -> Summary {
        Summary {
            command_errors: self.command_errors.len(),
            ..self.tree.summary()
        }
    }
}

/// Mutable state of one run; only ever touched under one lock.
#[derive(Default)]
struct RunData {
    tree: ResultTree,
    dedup: Deduplicator,
    command_errors: Vec<String>,
    done: usize,
}

impl RunData {
    fn apply(&mut self, profile: &str, output: &str) {
        let text = parser::normalize_newlines(output);
        for line in text.split('\n') {
            match parser::parse_line(line, profile) {
                ParsedLine::Diagnostic(d) => {
                    if !self.dedup.try_record(&d.message) {
                        continue;
                    }
                    let file = self.tree.ensure_file(&d.file_path);
                    self.tree.insert_diagnostic(
                        file,
                        d.severity,
                        DiagnosticNode {
                            file_path: d.file_path,
                            line: d.line,
                            column: d.column,
                            message: d.message,
                        },
                    );
                }
                ParsedLine::CommandError(e) => {
                    if self.dedup.try_record(&e) {
                        self.command_errors.push(e);
                    }
                }
                ParsedLine::Noise => {}
            }
        }
    }

    fn finish_unit(&mut self, total: usize, progress: &(dyn Fn(u8) + Sync)) {
        self.done += 1;
        progress(percent(self.done, total));
    }
}

/// Outcome of one unit before it is folded into the tree.
enum UnitResult {
    Output(String),
    RuntimeError(String),
}

pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 * 100.0) / total as f64).round().min(100.0) as u8
}

/// Recursively list `*.<extension>` files under `root`, sorted.
pub fn discover_sources(root: &Path, extension: &str) -> Result<Vec<PathBuf>, AnalyzeError> {
    let base = glob::Pattern::escape(&root.to_string_lossy());
    let pattern = format!("{}/**/*.{}", base.trim_end_matches(['/', '\\']), extension);
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Runs analyses; at most one run at a time per instance.
pub struct Analyzer<R: ToolRunner = ProcessRunner> {
    options: AnalyzeOptions,
    runner: R,
    state: Mutex<RunState>,
}

impl Analyzer<ProcessRunner> {
    pub fn new(options: AnalyzeOptions) -> Self {
        Self::with_runner(options, ProcessRunner)
    }
}

impl<R: ToolRunner> Analyzer<R> {
    pub fn with_runner(options: AnalyzeOptions, runner: R) -> Self {
        Self {
            options,
            runner,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Run a full analysis on the calling thread.
    ///
    /// `progress` receives `round(100 * done / total)` after every unit. Fails
    /// with `AlreadyRunning` if another run on this analyzer is in progress.
    pub fn run(
        &self,
        progress: &(dyn Fn(u8) + Sync),
        cancel: &CancelToken,
    ) -> Result<RunOutcome, AnalyzeError> {
        let mut guard = RunGuard::enter(&self.state)?;
        let result = self.execute(progress, cancel);
        guard.end = match &result {
            Ok(outcome) => outcome.state,
            Err(_) => RunState::Failed,
        };
        drop(guard);
        match &result {
            Ok(outcome) => log::info!(
                "analysis {:?}: {}/{} units",
                outcome.state,
                outcome.units_done,
                outcome.units_total
            ),
            Err(e) => log::error!("analysis failed: {}", e),
        }
        result
    }

    fn execute(
        &self,
        progress: &(dyn Fn(u8) + Sync),
        cancel: &CancelToken,
    ) -> Result<RunOutcome, AnalyzeError> {
        let dir = &self.options.analyze_directory;
        if !dir.is_dir() {
            return Err(AnalyzeError::DirectoryNotFound(dir.clone()));
        }
        let files = discover_sources(dir, &self.options.extension)?;
        let total = files.len() * self.options.profiles.len();
        log::info!(
            "analyzing {} files x {} profiles in {}",
            files.len(),
            self.options.profiles.len(),
            dir.display()
        );

        let data = Mutex::new(RunData::default());
        let cancelled = if total == 0 {
            progress(100);
            false
        } else if self.options.jobs > 1 {
            self.execute_parallel(&files, total, &data, progress, cancel)?
        } else {
            self.execute_sequential(&files, total, &data, progress, cancel)?
        };

        let data = data.into_inner();
        Ok(RunOutcome {
            state: if cancelled {
                RunState::Cancelled
            } else {
                RunState::Completed
            },
            tree: data.tree,
            command_errors: data.command_errors,
            units_total: total,
            units_done: data.done,
        })
    }

    fn execute_sequential(
        &self,
        files: &[PathBuf],
        total: usize,
        data: &Mutex<RunData>,
        progress: &(dyn Fn(u8) + Sync),
        cancel: &CancelToken,
    ) -> Result<bool, AnalyzeError> {
        for profile in &self.options.profiles {
            for file in files {
                if cancel.is_cancelled() {
                    return Ok(true);
                }
                let unit = self.run_unit(profile, file)?;
                let mut d = data.lock();
                apply_unit(&mut d, profile, unit);
                d.finish_unit(total, progress);
            }
        }
        Ok(false)
    }

    fn execute_parallel(
        &self,
        files: &[PathBuf],
        total: usize,
        data: &Mutex<RunData>,
        progress: &(dyn Fn(u8) + Sync),
        cancel: &CancelToken,
    ) -> Result<bool, AnalyzeError> {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                log::warn!("cannot build worker pool ({}); running sequentially", e);
                return self.execute_sequential(files, total, data, progress, cancel);
            }
        };

        for profile in &self.options.profiles {
            if cancel.is_cancelled() {
                return Ok(true);
            }
            // slots[i] holds file i's result until every earlier file is applied
            let slots: Mutex<(Vec<Option<UnitResult>>, usize)> =
                Mutex::new(((0..files.len()).map(|_| None).collect(), 0));
            let launch_error: Mutex<Option<AnalyzeError>> = Mutex::new(None);

            pool.install(|| {
                files.par_iter().enumerate().for_each(|(i, file)| {
                    if cancel.is_cancelled() || launch_error.lock().is_some() {
                        return;
                    }
                    let unit = match self.run_unit(profile, file) {
                        Ok(unit) => unit,
                        Err(e) => {
                            launch_error.lock().get_or_insert(e);
                            return;
                        }
                    };
                    let mut guard = slots.lock();
                    let (pending, next) = &mut *guard;
                    pending[i] = Some(unit);
                    let mut d = data.lock();
                    while *next < pending.len() {
                        match pending[*next].take() {
                            Some(ready) => {
                                apply_unit(&mut d, profile, ready);
                                d.finish_unit(total, progress);
                                *next += 1;
                            }
                            None => break,
                        }
                    }
                });
            });

            if let Some(e) = launch_error.into_inner() {
                return Err(e);
            }
            // units finished after a skipped one are still folded in, in order
            let (pending, _) = slots.into_inner();
            let mut d = data.lock();
            for ready in pending.into_iter().flatten() {
                apply_unit(&mut d, profile, ready);
                d.finish_unit(total, progress);
            }
            drop(d);
            if cancel.is_cancelled() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn run_unit(&self, profile: &Profile, file: &Path) -> Result<UnitResult, AnalyzeError> {
        let inv = Invocation::build(
            &self.options.command,
            &self.options.base_args,
            profile,
            file,
        );
        log::debug!("[{}] {} {}", profile.name, inv.program, inv.command_line);
        match self.runner.run(&inv) {
            Ok(out) => {
                if out.status != Some(0) {
                    log::warn!(
                        "[{}] analyzer exited with {:?} for {}",
                        profile.name,
                        out.status,
                        file.display()
                    );
                }
                Ok(UnitResult::Output(out.combined()))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                ) =>
            {
                Err(AnalyzeError::ToolLaunchFailure {
                    command: inv.program,
                    source: e,
                })
            }
            Err(e) => {
                log::warn!("[{}] failed to run analyzer: {}", profile.name, e);
                Ok(UnitResult::RuntimeError(format!(
                    "[{}] error: failed to run analyzer on {}: {}",
                    profile.name,
                    file.display(),
                    e
                )))
            }
        }
    }
}

/// Holds the `Running` state for one run and leaves a terminal state on drop,
/// including when the run unwinds.
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
    end: RunState,
}

impl<'a> RunGuard<'a> {
    fn enter(state: &'a Mutex<RunState>) -> Result<Self, AnalyzeError> {
        let mut current = state.lock();
        if *current == RunState::Running {
            return Err(AnalyzeError::AlreadyRunning);
        }
        *current = RunState::Running;
        Ok(Self {
            state,
            end: RunState::Failed,
        })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = self.end;
    }
}

fn apply_unit(data: &mut RunData, profile: &Profile, unit: UnitResult) {
    match unit {
        UnitResult::Output(text) => data.apply(&profile.name, &text),
        UnitResult::RuntimeError(msg) => {
            if data.dedup.try_record(&msg) {
                data.command_errors.push(msg);
            }
        }
    }
}

impl<R: ToolRunner + Send + 'static> Analyzer<R> {
    /// Run on a background thread. The returned handle can cancel and join.
    pub fn spawn<F>(self: Arc<Self>, progress: F) -> AnalysisHandle
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let join = std::thread::spawn(move || self.run(&progress, &token));
        AnalysisHandle { join, cancel }
    }
}

/// Handle to an analysis running on a background thread.
pub struct AnalysisHandle {
    join: JoinHandle<Result<RunOutcome, AnalyzeError>>,
    cancel: CancelToken,
}

impl AnalysisHandle {
    /// Ask the run to stop before its next unit.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to stop and take its outcome.
    pub fn join(self) -> Result<RunOutcome, AnalyzeError> {
        self.join.join().map_err(|_| AnalyzeError::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResultNode, Severity};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    /// Answers by file name; unknown files produce no output.
    struct ScriptedRunner {
        outputs: HashMap<String, String>,
        fail_kind: Option<io::ErrorKind>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl ScriptedRunner {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                outputs: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                fail_kind: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ToolRunner for ScriptedRunner {
        fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput> {
            self.calls.lock().push(invocation.clone());
            if let Some(kind) = self.fail_kind {
                return Err(io::Error::new(kind, "scripted failure"));
            }
            let file = invocation.args().last().unwrap_or_default();
            let name = Path::new(file)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            Ok(ToolOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: self.outputs.get(&name).cloned().unwrap_or_default(),
            })
        }
    }

    fn options(dir: &Path, profiles: &[&str], jobs: usize) -> AnalyzeOptions {
        AnalyzeOptions {
            analyze_directory: dir.to_path_buf(),
            profiles: profiles
                .iter()
                .map(|n| {
                    let mut p = Profile::new(*n);
                    p.options = vec![format!("-D{}", n.to_uppercase())];
                    p
                })
                .collect(),
            command: "fake-clang".into(),
            base_args: vec!["-cc1".into(), "-analyze".into()],
            extension: "cpp".into(),
            jobs,
        }
    }

    fn source_tree(files: &[&str]) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for f in files {
            let p = dir.path().join(f);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, "int main() {}\n").unwrap();
        }
        dir
    }

    fn collect_progress() -> (Arc<Mutex<Vec<u8>>>, impl Fn(u8) + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |p| sink.lock().push(p))
    }

    #[test]
    fn test_invocation_layout() {
        let mut p = Profile::new("x64");
        p.options = vec!["-triple x86_64".into(), "-DX".into()];
        let inv = Invocation::build(
            "clang++",
            &["-cc1".to_string(), "-analyze".to_string()],
            &p,
            Path::new("C:/src/a.cpp"),
        );
        assert_eq!(inv.command_line, "-cc1 -analyze -triple x86_64 -DX C:/src/a.cpp");
        let args: Vec<_> = inv.args().collect();
        assert_eq!(args, vec!["-cc1", "-analyze", "-triple", "x86_64", "-DX", "C:/src/a.cpp"]);
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn test_missing_directory_fails_without_progress() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let analyzer =
            Analyzer::with_runner(options(&missing, &["a"], 1), ScriptedRunner::new(&[]));
        let (seen, progress) = collect_progress();
        let err = analyzer.run(&progress, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, AnalyzeError::DirectoryNotFound(_)));
        assert!(seen.lock().is_empty());
        assert_eq!(analyzer.state(), RunState::Failed);
        assert!(analyzer.runner.calls.lock().is_empty());
    }

    #[test]
    fn test_duplicate_across_profiles_yields_one_node() {
        let src = source_tree(&["a.cpp", "sub/b.cpp"]);
        let warn = "C:/src/a.cpp:10:5: warning: unused variable [-Wunused-variable]\r\n";
        let runner = ScriptedRunner::new(&[("a.cpp", warn)]);
        let analyzer = Analyzer::with_runner(options(src.path(), &["x86", "x64"], 1), runner);
        let (seen, progress) = collect_progress();
        let out = analyzer.run(&progress, &CancelToken::new()).unwrap();

        assert_eq!(out.state, RunState::Completed);
        assert_eq!(out.units_total, 4);
        assert_eq!(*seen.lock(), vec![25, 50, 75, 100]);
        let summary = out.summary();
        assert_eq!((summary.files, summary.warnings, summary.errors), (1, 1, 0));

        let file = out.tree.find_file("C:/src/a.cpp").unwrap();
        let folder = out.tree.find_folder("C:/src").unwrap();
        assert!(out.tree.children(folder).contains(&file));
        let diag = out.tree.children(file)[0];
        match out.tree.node(diag) {
            ResultNode::Warning(d) => {
                assert!(d.message.ends_with("Disable with -Wno-unused-variable]"));
                assert_eq!((d.line, d.column), (10, 5));
            }
            other => panic!("expected warning, got {:?}", other),
        }

        let calls = analyzer.runner.calls.lock();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].command_line.starts_with("-cc1 -analyze -DX86 "));
        assert!(calls[2].command_line.starts_with("-cc1 -analyze -DX64 "));
        assert_eq!(analyzer.state(), RunState::Completed);
    }

    #[test]
    fn test_errors_and_command_errors() {
        let src = source_tree(&["a.cpp"]);
        let text = "C:/src/a.cpp:3:1: error: use of undeclared identifier 'x'\n\
                    1 error generated.\n\
                    clang++: error: unknown argument: '-bogus'\n";
        let runner = ScriptedRunner::new(&[("a.cpp", text)]);
        let analyzer = Analyzer::with_runner(options(src.path(), &["p1", "p2"], 1), runner);
        let out = analyzer.run(&|_| {}, &CancelToken::new()).unwrap();

        let file = out.tree.find_file("C:/src/a.cpp").unwrap();
        assert!(out.tree.file_has_error(file));
        let node = out.tree.node(out.tree.children(file)[0]);
        assert_eq!(node.as_diagnostic().map(|(_, s)| s), Some(Severity::Error));
        assert_eq!(
            out.command_errors,
            vec![
                "[p1] clang++: error: unknown argument: '-bogus'".to_string(),
                "[p2] clang++: error: unknown argument: '-bogus'".to_string(),
            ]
        );
    }

    #[test]
    fn test_launch_failure_is_fatal() {
        let src = source_tree(&["a.cpp", "b.cpp"]);
        let mut runner = ScriptedRunner::new(&[]);
        runner.fail_kind = Some(io::ErrorKind::NotFound);
        let analyzer = Analyzer::with_runner(options(src.path(), &["p"], 1), runner);
        let err = analyzer.run(&|_| {}, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, AnalyzeError::ToolLaunchFailure { .. }));
        assert_eq!(analyzer.runner.calls.lock().len(), 1);
        assert_eq!(analyzer.state(), RunState::Failed);
    }

    #[test]
    fn test_other_spawn_errors_are_recorded_and_run_continues() {
        let src = source_tree(&["a.cpp", "b.cpp"]);
        let mut runner = ScriptedRunner::new(&[]);
        runner.fail_kind = Some(io::ErrorKind::Other);
        let analyzer = Analyzer::with_runner(options(src.path(), &["p"], 1), runner);
        let out = analyzer.run(&|_| {}, &CancelToken::new()).unwrap();
        assert_eq!(out.state, RunState::Completed);
        assert_eq!(out.units_done, 2);
        assert_eq!(out.command_errors.len(), 2);
        assert!(out.command_errors[0].starts_with("[p] error: failed to run analyzer"));
    }

    #[test]
    fn test_cancel_before_start_skips_all_units() {
        let src = source_tree(&["a.cpp"]);
        let analyzer =
            Analyzer::with_runner(options(src.path(), &["p"], 1), ScriptedRunner::new(&[]));
        let cancel = CancelToken::new();
        cancel.cancel();
        let out = analyzer.run(&|_| {}, &cancel).unwrap();
        assert_eq!(out.state, RunState::Cancelled);
        assert_eq!(out.units_done, 0);
        assert!(out.tree.is_empty());
        assert_eq!(analyzer.state(), RunState::Cancelled);
    }

    #[test]
    fn test_cancel_from_progress_stops_after_current_unit() {
        let src = source_tree(&["a.cpp", "b.cpp", "c.cpp"]);
        let analyzer =
            Analyzer::with_runner(options(src.path(), &["p"], 1), ScriptedRunner::new(&[]));
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let out = analyzer.run(&move |_| token.cancel(), &cancel).unwrap();
        assert_eq!(out.state, RunState::Cancelled);
        assert_eq!(out.units_done, 1);
        assert_eq!(analyzer.runner.calls.lock().len(), 1);
    }

    #[test]
    fn test_no_sources_reports_full_progress_once() {
        let src = source_tree(&["readme.txt"]);
        let analyzer =
            Analyzer::with_runner(options(src.path(), &["p"], 1), ScriptedRunner::new(&[]));
        let (seen, progress) = collect_progress();
        let out = analyzer.run(&progress, &CancelToken::new()).unwrap();
        assert_eq!(out.state, RunState::Completed);
        assert_eq!(out.units_total, 0);
        assert_eq!(*seen.lock(), vec![100]);
    }

    #[test]
    fn test_parallel_run_matches_sequential_tree() {
        let names = ["a.cpp", "b.cpp", "c.cpp", "d.cpp", "e.cpp"];
        let src = source_tree(&names);
        let lines: Vec<(String, String)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                (
                    n.to_string(),
                    format!(
                        "C:/src/{n}:{}:1: warning: w{i} [-Wshadow]\nC:/src/common.h:1:1: warning: shared\n",
                        i + 1
                    ),
                )
            })
            .collect();
        let pairs: Vec<(&str, &str)> = lines.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();

        let seq = Analyzer::with_runner(options(src.path(), &["p", "q"], 1), ScriptedRunner::new(&pairs))
            .run(&|_| {}, &CancelToken::new())
            .unwrap();
        let (seen, progress) = collect_progress();
        let par = Analyzer::with_runner(options(src.path(), &["p", "q"], 4), ScriptedRunner::new(&pairs))
            .run(&progress, &CancelToken::new())
            .unwrap();

        let root_seq = seq.tree.root();
        let root_par = par.tree.root();
        assert_eq!(seq.tree.aggregate_text(root_seq), par.tree.aggregate_text(root_par));
        assert_eq!(par.summary().warnings, 6);
        let seen = seen.lock();
        assert_eq!(seen.len(), 10);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn test_spawn_runs_in_background_and_rejects_reentry() {
        let src = source_tree(&["a.cpp"]);
        let analyzer = Arc::new(Analyzer::with_runner(
            options(src.path(), &["p"], 1),
            ScriptedRunner::new(&[("a.cpp", "C:/x/a.cpp:1:1: warning: w\n")]),
        ));
        let handle = analyzer.clone().spawn(|_| {});
        let out = handle.join().unwrap();
        assert_eq!(out.state, RunState::Completed);
        assert_eq!(out.summary().warnings, 1);

        *analyzer.state.lock() = RunState::Running;
        let err = analyzer.run(&|_| {}, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, AnalyzeError::AlreadyRunning));
    }

    /// Blocks its first invocation until released.
    #[derive(Default)]
    struct GatedRunner {
        started: AtomicBool,
        release: AtomicBool,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl ToolRunner for GatedRunner {
        fn run(&self, _invocation: &Invocation) -> io::Result<ToolOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.store(true, Ordering::SeqCst);
            while !self.release.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Ok(ToolOutput::default())
        }
    }

    #[test]
    fn test_panicking_progress_leaves_analyzer_reusable() {
        let src = source_tree(&["a.cpp"]);
        let analyzer =
            Analyzer::with_runner(options(src.path(), &["p"], 1), ScriptedRunner::new(&[]));
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            analyzer.run(&|_| panic!("progress sink failed"), &CancelToken::new())
        }));
        assert!(panicked.is_err());
        assert_eq!(analyzer.state(), RunState::Failed);

        let out = analyzer.run(&|_| {}, &CancelToken::new()).unwrap();
        assert_eq!(out.state, RunState::Completed);
        assert_eq!(analyzer.state(), RunState::Completed);
    }

    #[test]
    fn test_handle_cancel_stops_background_run_after_current_unit() {
        let src = source_tree(&["a.cpp", "b.cpp", "c.cpp"]);
        let analyzer = Arc::new(Analyzer::with_runner(
            options(src.path(), &["p", "q"], 1),
            GatedRunner::default(),
        ));
        let handle = analyzer.clone().spawn(|_| {});
        while !analyzer.runner.started.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        handle.cancel();
        analyzer.runner.release.store(true, Ordering::SeqCst);

        let out = handle.join().unwrap();
        assert_eq!(out.state, RunState::Cancelled);
        assert_eq!(out.units_total, 6);
        assert_eq!(out.units_done, 1);
        assert_eq!(analyzer.runner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(analyzer.state(), RunState::Cancelled);
    }

    #[test]
    fn test_parallel_cancel_from_progress() {
        let names = ["a.cpp", "b.cpp", "c.cpp", "d.cpp", "e.cpp", "f.cpp", "g.cpp", "h.cpp"];
        let src = source_tree(&names);
        let lines: Vec<(String, String)> = names
            .iter()
            .map(|n| (n.to_string(), format!("C:/src/{n}:1:1: warning: w\n")))
            .collect();
        let pairs: Vec<(&str, &str)> = lines.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let analyzer =
            Analyzer::with_runner(options(src.path(), &["p", "q"], 4), ScriptedRunner::new(&pairs));

        let cancel = CancelToken::new();
        let token = cancel.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let out = analyzer
            .run(
                &move |p| {
                    sink.lock().push(p);
                    token.cancel();
                },
                &cancel,
            )
            .unwrap();

        assert_eq!(out.state, RunState::Cancelled);
        assert_eq!(out.units_total, 16);
        assert!(out.units_done >= 1);
        assert!(out.units_done < out.units_total);
        assert_eq!(out.summary().warnings, out.units_done);
        let seen = seen.lock();
        assert_eq!(seen.len(), out.units_done);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.last().copied().unwrap_or(0) < 100);
    }
}
