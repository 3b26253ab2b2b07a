//! The `pion` command-line front end.

use std::{
    env,
    fs::File,
    io::Write as _,
    path::PathBuf,
    process::{Command as Subprocess, ExitCode},
};

use clap::{Parser, Subcommand};
use tracing::error;

use pion::{Invocation, OptionOverride};

#[derive(Parser)]
#[command(name = "pion", version, about = "A meson-compatible build configuration tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate meson.build in the current directory and write build
    /// artifacts into the build directory.
    Setup {
        /// Option overrides, name=value.
        #[arg(short = 'D', value_name = "OPT=VAL")]
        define: Vec<String>,
        /// The build directory.
        build_dir: PathBuf,
    },
    /// Regenerate a configured build directory.
    Build {
        /// Re-run setup from a setup record.
        #[arg(short = 'r')]
        regenerate: bool,
        /// Path to the setup record.
        #[arg(short = 'c', value_name = "SETUP")]
        config: PathBuf,
    },
    /// Internal helpers invoked from generated manifests.
    Internal {
        #[command(subcommand)]
        command: Internal,
    },
    /// Run the tests recorded in a configured build directory.
    Test {
        /// The build directory.
        build_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum Internal {
    /// Spawn a command, optionally capturing its stdout into a file.
    Exe {
        /// Write the child's stdout to this path.
        #[arg(short = 'c', value_name = "PATH")]
        capture: Option<PathBuf>,
        /// The command and its arguments.
        #[arg(last = true, required = true)]
        argv: Vec<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let argv0 = env::args().next().unwrap_or_else(|| "pion".to_owned());

    match cli.command {
        Command::Setup { define, build_dir } => cmd_setup(&define, build_dir, &argv0),
        Command::Build { regenerate, config } => cmd_build(regenerate, &config, &argv0),
        Command::Internal {
            command: Internal::Exe { capture, argv },
        } => cmd_internal_exe(capture, &argv),
        Command::Test { build_dir } => cmd_test(&build_dir),
    }
}

fn cmd_setup(define: &[String], build_dir: PathBuf, argv0: &str) -> ExitCode {
    let mut overrides = Vec::with_capacity(define.len());
    for raw in define {
        match OptionOverride::parse(raw) {
            Ok(ov) => overrides.push(ov),
            Err(msg) => {
                eprintln!("error: {msg}");
                return ExitCode::FAILURE;
            }
        }
    }

    let source_root = match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("error: cannot determine current directory: {err}");
            return ExitCode::FAILURE;
        }
    };

    let invocation = Invocation {
        source_root,
        build_dir,
        argv0: argv0.to_owned(),
        overrides,
    };
    match pion::setup_build(&invocation) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_build(regenerate: bool, config: &PathBuf, argv0: &str) -> ExitCode {
    if !regenerate {
        eprintln!("error: pion does not execute builds; pass -r to regenerate from a setup record");
        return ExitCode::FAILURE;
    }
    match pion::regenerate(config, argv0) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// The capture wrapper written into CUSTOM_COMMAND edges: run argv, tee
/// stdout into the capture file, and exit with the child's status.
fn cmd_internal_exe(capture: Option<PathBuf>, argv: &[String]) -> ExitCode {
    let (program, args) = argv.split_first().expect("clap requires at least one element");
    let mut cmd = Subprocess::new(program);
    cmd.args(args);

    if let Some(capture_path) = capture {
        let output = match cmd.output() {
            Ok(output) => output,
            Err(err) => {
                eprintln!("error: cannot spawn '{program}': {err}");
                return ExitCode::FAILURE;
            }
        };
        let write_result = File::create(&capture_path).and_then(|mut f| f.write_all(&output.stdout));
        if let Err(err) = write_result {
            eprintln!("error: cannot write '{}': {err}", capture_path.display());
            return ExitCode::FAILURE;
        }
        std::io::stderr().write_all(&output.stderr).ok();
        exit_code_of(output.status)
    } else {
        match cmd.status() {
            Ok(status) => exit_code_of(status),
            Err(err) => {
                eprintln!("error: cannot spawn '{program}': {err}");
                ExitCode::FAILURE
            }
        }
    }
}

fn exit_code_of(status: std::process::ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::from(u8::try_from(code.clamp(0, 255)).expect("clamped to u8 range")),
        None => ExitCode::FAILURE,
    }
}

fn cmd_test(build_dir: &PathBuf) -> ExitCode {
    match pion::run_tests(build_dir) {
        Ok(summary) => {
            if summary.all_passed() {
                println!("ok: {} tests passed", summary.total);
                ExitCode::SUCCESS
            } else {
                error!("{} of {} tests failed", summary.failed, summary.total);
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
