use crate::env_lock;
use clap::Parser;
use refdupe::cli::Cli;
use refdupe::config::ConfigError;
use refdupe::error::ExitCode;
use refdupe::run_app;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ref")).unwrap();
        fs::create_dir_all(dir.path().join("cand")).unwrap();
        fs::write(dir.path().join("config.toml"), "").unwrap();
        Self { dir }
    }

    fn path(&self, rel: &str) -> String {
        self.dir.path().join(rel).to_string_lossy().into_owned()
    }

    fn write(&self, rel: &str, contents: &str) {
        fs::write(self.dir.path().join(rel), contents).unwrap();
    }

    fn run(&self, extra: &[&str]) -> anyhow::Result<ExitCode> {
        let (config, reference, candidate) =
            (self.path("config.toml"), self.path("ref"), self.path("cand"));
        let mut args = vec![
            "refdupe",
            "-q",
            "--config",
            config.as_str(),
            "--f1",
            reference.as_str(),
            "--f2",
            candidate.as_str(),
        ];
        args.extend_from_slice(extra);
        run_app(Cli::try_parse_from(args).unwrap())
    }

    fn log(&self) -> String {
        fs::read_to_string(self.dir.path().join("out.log")).unwrap()
    }
}

#[test]
fn test_report_to_log_file() {
    let _lock = env_lock();
    let fx = Fixture::new();
    fx.write("ref/a.txt", "x");
    fx.write("cand/b.txt", "x");
    fx.write("cand/c.txt", "y");
    let out = fx.path("out.log");

    let code = fx.run(&["--output", &out]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(
        fx.log(),
        format!(
            "{} is duplicate of {}\n",
            fx.path("cand/b.txt"),
            fx.path("ref/a.txt")
        )
    );
    assert!(Path::new(&fx.path("cand/b.txt")).exists());
}

#[test]
fn test_move_with_json_log() {
    let _lock = env_lock();
    let fx = Fixture::new();
    fx.write("ref/a.txt", "x");
    fx.write("cand/b.txt", "x");
    let (out, q) = (fx.path("out.log"), fx.path("q"));

    let code = fx
        .run(&["--move", &q, "--output", &out, "--format", "json"])
        .unwrap();

    assert_eq!(code, ExitCode::Success);
    let events: Vec<serde_json::Value> = fx
        .log()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], "duplicate");
    assert_eq!(events[1]["event"], "moved");
    assert!(Path::new(&q).join("b.txt").is_file());
    assert!(Path::new(&fx.path("ref/a.txt")).is_file());
}

#[test]
fn test_no_duplicates_still_succeeds() {
    let _lock = env_lock();
    let fx = Fixture::new();
    fx.write("ref/a.txt", "x");
    fx.write("cand/b.txt", "y");

    assert_eq!(fx.run(&["--output", "null"]).unwrap(), ExitCode::Success);
}

#[test]
fn test_same_tree_run() {
    let _lock = env_lock();
    let fx = Fixture::new();
    for name in ["a", "b", "c"] {
        fx.write(&format!("ref/{name}"), "same");
    }
    let (tree, out, config) = (fx.path("ref"), fx.path("out.log"), fx.path("config.toml"));

    let cli = Cli::try_parse_from([
        "refdupe",
        "-q",
        "--config",
        config.as_str(),
        "--f1",
        tree.as_str(),
        "--f2",
        tree.as_str(),
        "--output",
        out.as_str(),
    ])
    .unwrap();
    assert_eq!(run_app(cli).unwrap(), ExitCode::Success);
    assert_eq!(fx.log().lines().count(), 2);
}

#[test]
fn test_missing_root_is_a_general_error() {
    let _lock = env_lock();
    let fx = Fixture::new();
    fs::remove_dir(fx.dir.path().join("cand")).unwrap();

    let err = fx.run(&["--output", "null"]).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::RootNotFound { which: "candidate", .. })
    ));
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}

#[test]
fn test_quarantine_inside_candidate_is_rejected() {
    let _lock = env_lock();
    let fx = Fixture::new();
    fx.write("ref/a.txt", "x");
    fx.write("cand/b.txt", "x");
    let q = fx.path("cand/dupes");

    let err = fx.run(&["--move", &q, "--output", "null"]).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::QuarantineInsideCandidate { .. })
    ));
    assert!(Path::new(&fx.path("cand/b.txt")).exists());
}

#[test]
fn test_unwritable_log_destination_fails_before_scanning() {
    let _lock = env_lock();
    let fx = Fixture::new();
    let out = fx.path("no/such/dir/out.log");

    assert!(fx.run(&["--output", &out]).is_err());
}

#[test]
fn test_config_file_settings_apply() {
    let _lock = env_lock();
    let fx = Fixture::new();
    fx.write("config.toml", "min_size = 10\n");
    fx.write("ref/small", "x");
    fx.write("cand/small", "x");
    let out = fx.path("out.log");

    fx.run(&["--output", &out]).unwrap();
    assert!(fx.log().is_empty());

    // The command line wins over the file.
    fx.run(&["--output", &out, "--min-size", "0"]).unwrap();
    assert_eq!(fx.log().lines().count(), 1);
}
