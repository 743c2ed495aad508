use chanstat_core::{Database, StatsSink};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    xdg_runtime: PathBuf,
    logs: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let xdg_runtime = base.join("xdg-runtime");
        let logs = base.join("logs");

        for dir in [&home, &xdg_data, &xdg_config, &xdg_state, &xdg_runtime, &logs] {
            fs::create_dir_all(dir)
                .unwrap_or_else(|e| panic!("failed to create {}: {e}", dir.display()));
        }

        seed_irssi_fixture(&logs);

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
            xdg_runtime,
            logs,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("chanstat/data.db")
    }

    fn log(&self, name: &str) -> PathBuf {
        self.logs.join(name)
    }

    fn write_config(&self, content: &str) {
        let dir = self.xdg_config.join("chanstat");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), content).expect("failed to write config");
    }
}

fn seed_irssi_fixture(logs: &Path) {
    let source = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../chanstat-core/tests/fixtures/irssi/chan.20110314.log");
    fs::copy(source, logs.join("chan.20110314.log")).expect("failed to copy irssi fixture");
}

fn run_chanstat(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("chanstat"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env("XDG_RUNTIME_DIR", &env.xdg_runtime)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute chanstat: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "chanstat {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn parse_populates_db_and_rerun_is_up_to_date() {
    let env = CliTestEnv::new();
    let log = env.log("chan.20110314.log");
    let log_arg = log.to_str().expect("utf-8 temp path");

    let output = run_chanstat(&env, &[log_arg]);
    assert_success(&[log_arg], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("7 message(s)"),
        "expected per-file summary in stdout, got:\n{stdout}"
    );
    assert!(stdout.contains("Parse complete:"));

    let db_path = env.db_path();
    assert!(
        db_path.exists(),
        "database file should exist at {}",
        db_path.display()
    );

    let output = run_chanstat(&env, &[log_arg]);
    assert_success(&[log_arg], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("up to date"),
        "expected second run to be a no-op, got:\n{stdout}"
    );

    let db = Database::open(&db_path).expect("failed to open db");
    db.migrate().expect("failed to migrate db");

    let day = db
        .get_channel_day(chrono::NaiveDate::from_ymd_opt(2011, 3, 14).unwrap())
        .expect("failed to read channel day")
        .expect("channel day should be stored");
    assert_eq!(day.total, 7, "second run must not double count");

    let carol = db
        .get_nick_summary("carol")
        .expect("failed to read nick")
        .expect("carol should be stored");
    assert_eq!(carol.lines, 3);
    assert_eq!(db.load_streak().unwrap().nick, "carol");
}

#[test]
fn appended_lines_are_picked_up() {
    let env = CliTestEnv::new();
    let log = env.log("chan.20110314.log");
    let log_arg = log.to_str().expect("utf-8 temp path");

    assert_success(&[log_arg], &run_chanstat(&env, &[log_arg]));

    let mut file = fs::OpenOptions::new().append(true).open(&log).unwrap();
    writeln!(file, "14:00 < dave> late arrival").unwrap();
    drop(file);

    let output = run_chanstat(&env, &[log_arg]);
    assert_success(&[log_arg], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 message(s)"), "got:\n{stdout}");

    let db = Database::open(&env.db_path()).expect("failed to open db");
    let dave = db.get_nick_summary("dave").unwrap().expect("dave");
    assert_eq!(dave.lines, 1);
}

#[test]
fn mirc_format_from_flag_and_explicit_date() {
    let env = CliTestEnv::new();
    let log = env.log("channel.log.gz");
    let file = fs::File::create(&log).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder
        .write_all(b"[20:01] <dave> evening all\n[20:02] <erin> hey\n")
        .unwrap();
    encoder.finish().unwrap();

    let log_arg = log.to_str().expect("utf-8 temp path");
    let args = ["--format", "mirc", "--date", "2011-03-15", "-v", log_arg];
    let output = run_chanstat(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Format: mirc"), "got:\n{stdout}");
    assert!(stdout.contains("2 message(s)"), "got:\n{stdout}");

    let db = Database::open(&env.db_path()).expect("failed to open db");
    let day = db
        .get_channel_day(chrono::NaiveDate::from_ymd_opt(2011, 3, 15).unwrap())
        .unwrap()
        .expect("channel day");
    assert_eq!(day.hours[20], 2);
}

#[test]
fn format_from_config_file() {
    let env = CliTestEnv::new();
    env.write_config("[parser]\nformat = \"mirc\"\n");

    let log = env.log("chan.20110316.log");
    fs::write(&log, "[08:00] <zed> hi there\n").unwrap();
    let log_arg = log.to_str().expect("utf-8 temp path");

    let output = run_chanstat(&env, &[log_arg]);
    assert_success(&[log_arg], &output);

    let db = Database::open(&env.db_path()).expect("failed to open db");
    assert_eq!(db.get_nick_summary("zed").unwrap().unwrap().lines, 1);
}

#[test]
fn undated_log_without_date_flag_fails() {
    let env = CliTestEnv::new();
    let log = env.log("channel.log");
    fs::write(&log, "10:00 <amy> hi\n").unwrap();
    let log_arg = log.to_str().expect("utf-8 temp path");

    let output = run_chanstat(&env, &[log_arg]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--date"), "got:\n{stderr}");
    assert!(!env.db_path().exists(), "nothing should be written");
}

#[test]
fn unknown_format_is_rejected() {
    let env = CliTestEnv::new();
    let log = env.log("chan.20110314.log");
    let log_arg = log.to_str().expect("utf-8 temp path");

    let args = ["--format", "weechat", log_arg];
    let output = run_chanstat(&env, &args);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("weechat"), "got:\n{stderr}");
}
