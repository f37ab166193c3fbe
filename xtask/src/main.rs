use std::fs;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the lambda resource workspace",
    long_about = "A unified CLI for CI checks and for laying out the resource\n\
                  binary the way a pipeline image expects it."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build the resource binary and install it as check, in and out
    ResourceLayout {
        /// Compilation target triple
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory the commands are installed into
        #[arg(long, env = "RESOURCE_DEST", default_value = "dist/opt/resource")]
        dest: String,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Unit and process tests
    Test,
    /// Run lint + test
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

const RESOURCE_BINARY: &str = "lambda_resource";
const RESOURCE_COMMANDS: [&str; 3] = ["check", "in", "out"];

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn layout_resource(target: &str, profile: BuildProfile, dest: &Path) {
    ensure_rust_target_installed(target);

    step("Build resource binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        "lambda_resource",
        "--target",
        target,
        "--bin",
        RESOURCE_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Install check/in/out");
    let built = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(binary_name(RESOURCE_BINARY, target));
    if !built.exists() {
        panic!("expected resource binary at '{}'", built.display());
    }

    fs::create_dir_all(dest).expect("failed to create resource directory");
    let installed = dest.join(binary_name(RESOURCE_BINARY, target));
    fs::copy(&built, &installed).expect("failed to copy resource binary");

    for command in RESOURCE_COMMANDS {
        let link = dest.join(binary_name(command, target));
        if link.exists() || link.is_symlink() {
            fs::remove_file(&link).expect("failed to replace existing command");
        }
        install_command(&installed, &link);
    }

    eprintln!("\nInstalled resource commands:");
    for command in RESOURCE_COMMANDS {
        eprintln!("- {}", dest.join(binary_name(command, target)).display());
    }
}

#[cfg(unix)]
fn install_command(binary: &Path, link: &Path) {
    let file_name = binary
        .file_name()
        .expect("resource binary path has a file name");
    std::os::unix::fs::symlink(file_name, link).expect("failed to link resource command");
}

#[cfg(not(unix))]
fn install_command(binary: &Path, link: &Path) {
    fs::copy(binary, link).expect("failed to copy resource command");
}

fn ensure_rust_target_installed(target: &str) {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output();

    let output = match output {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- resource-layout`"
        );
    }
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_lint() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_test() {
    step("Test lambda_resource_core");
    run_cargo(&["test", "-p", "lambda_resource_core"]);

    step("Test lambda_resource");
    run_cargo(&["test", "-p", "lambda_resource"]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Lint => ci_lint(),
                CiJob::Test => ci_test(),
                CiJob::Check => {
                    ci_lint();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::ResourceLayout {
            target,
            profile,
            dest,
        } => {
            layout_resource(&target, profile, Path::new(&dest));
        }
    }
}
