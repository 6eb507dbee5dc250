use commitbill_core::InvoiceStore;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const INVOICES: &str = r#"{
    "version": "1.0",
    "invoices": [
        {
            "id": "acme",
            "customer": "Acme",
            "schedule": { "type": "weekly-sunday" },
            "email": { "to": ["ap@acme.test"] },
            "git": { "repos": ["acme/api"], "weeks": 2, "hoursPerWeek": 30 }
        },
        {
            "id": "globex",
            "customer": "Globex",
            "schedule": { "type": "monthly-first" },
            "email": { "to": ["billing@globex.test"] },
            "git": { "repoDirs": ["~/code/globex-*"], "weeks": 1, "hoursPerWeek": 10 }
        }
    ],
    "global": { "defaultFromEmail": "me@example.com" }
}"#;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(xdg_config.join("commitbill")).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn with_invoices(json: &str) -> Self {
        let env = Self::new();
        fs::write(env.xdg_config.join("commitbill/invoices.json"), json)
            .expect("failed to write invoices.json");
        env
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("commitbill/invoices.db")
    }

    /// Directory under `~/code` that looks like a clone
    fn add_clone(&self, name: &str) {
        fs::create_dir_all(self.home.join("code").join(name).join(".git"))
            .expect("failed to create clone directory");
    }
}

fn run_bin(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Output {
    let bin_path = match bin_name {
        "commitbill" => PathBuf::from(assert_cmd::cargo::cargo_bin!("commitbill")),
        "commitbill-scheduled" => {
            PathBuf::from(assert_cmd::cargo::cargo_bin!("commitbill-scheduled"))
        }
        _ => panic!("unsupported binary in test harness: {bin_name}"),
    };

    let mut command = Command::new(bin_path);

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("GITHUB_TOKEN")
        .env_remove("COMMITBILL_MAIL_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute {bin_name}: {e}"))
}

fn assert_success(bin_name: &str, args: &[&str], output: &Output) {
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
        "{bin_name} {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn list_configs_shows_every_invoice() {
    let env = CliTestEnv::with_invoices(INVOICES);

    let output = run_bin(&env, "commitbill", &["--list-configs"]);
    assert_success("commitbill", &["--list-configs"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("acme"));
    assert!(stdout.contains("weekly-sunday"));
    assert!(stdout.contains("globex"));
    assert!(stdout.contains("~/code/globex-*"));
}

#[test]
fn unknown_config_id_exits_with_error() {
    let env = CliTestEnv::with_invoices(INVOICES);

    let output = run_bin(&env, "commitbill", &["initech"]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invoice configuration not found: initech"),
        "unexpected stderr:\n{stderr}"
    );
}

#[test]
fn missing_invoice_file_exits_with_error() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, "commitbill", &["--list-configs"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invoice definitions"));
}

#[test]
fn list_saved_on_empty_store() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, "commitbill", &["--list-saved"]);
    assert_success("commitbill", &["--list-saved"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("No saved invoices."));
    assert!(env.db_path().exists());
}

#[test]
fn customer_mode_generates_and_saves_from_local_clones() {
    let env = CliTestEnv::new();
    env.add_clone("acme-portal");

    let args = [
        "--customer",
        "acme",
        "--hours",
        "10",
        "--start",
        "2024-01-07",
        "--end",
        "2024-01-13",
    ];
    let output = run_bin(&env, "commitbill", &args);
    assert_success("commitbill", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Invoice for acme (January 7, 2024 - January 13, 2024)"));
    assert!(stdout.contains("January 7 - January 13, 2024 ----- 10hrs"));
    assert!(stdout.contains("Saved as "));

    let store = InvoiceStore::open(&env.db_path()).expect("failed to open store");
    store.migrate().expect("failed to migrate store");
    let saved = store
        .list(Some("customer:acme"))
        .expect("failed to list invoices");
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].invoice.total_hours, 10.0);
    assert!(!saved[0].is_sent());
}

#[test]
fn customer_without_clones_exits_with_error() {
    let env = CliTestEnv::new();
    env.add_clone("globex-site");

    let output = run_bin(&env, "commitbill", &["--customer", "acme", "--hours", "10"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no repositories found"));
}

#[test]
fn scheduled_pass_with_nothing_due() {
    let env = CliTestEnv::with_invoices(INVOICES);

    // Tuesday, not the first of the month
    let args = ["--date", "2024-01-16", "--dry-run"];
    let output = run_bin(&env, "commitbill-scheduled", &args);
    assert_success("commitbill-scheduled", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Schedule pass for 2024-01-16"));
    assert!(stdout.contains("No invoices due."));
}

#[test]
fn scheduled_pass_reports_failed_configuration() {
    let invoices = INVOICES.replace(r#""type": "monthly-first""#, r#""type": "custom""#);
    let env = CliTestEnv::with_invoices(&invoices);

    let args = ["--date", "2024-01-16", "--dry-run"];
    let output = run_bin(&env, "commitbill-scheduled", &args);
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("globex"));
    assert!(stdout.contains("FAILED: schedule error: custom schedules are not implemented"));
    assert!(stdout.contains("1 of 1 due invoice(s) failed"));
}
