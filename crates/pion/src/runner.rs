//! The test runner: loads the serialized inventory and executes each test.

use std::{fs, path::Path, process::Command};

use tracing::{error, info};

use crate::{
    diag::Diagnostic,
    output::{PRIVATE_DIR, TESTS_FILE},
    path, serial,
    setup::Error,
};

/// Outcome of a full test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSummary {
    pub total: usize,
    pub failed: usize,
}

impl TestSummary {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Runs every test recorded under `build_dir`.
///
/// Each test spawns with the build root as its working directory and the
/// recorded environment merged over the inherited one. A test passes when
/// its exit status agrees with its `should_fail` flag.
pub fn run_tests(build_dir: &Path) -> Result<TestSummary, Error> {
    run_tests_inner(build_dir).map_err(|diag| Error::new(&diag, &[]))
}

fn run_tests_inner(build_dir: &Path) -> Result<TestSummary, Diagnostic> {
    let build_root = path::make_absolute(build_dir)?;
    let inventory = build_root.join(PRIVATE_DIR).join(TESTS_FILE);
    let bytes = fs::read(&inventory)
        .map_err(|err| Diagnostic::io(format!("cannot read '{}': {err}", inventory.display())))?;
    let tests = serial::load_tests(&mut bytes.as_slice())
        .map_err(|err| Diagnostic::io(format!("'{}': {err}", inventory.display())))?;

    let mut summary = TestSummary {
        total: tests.len(),
        failed: 0,
    };

    for test in &tests {
        let mut cmd = Command::new(&test.exe);
        cmd.args(&test.args).current_dir(&build_root);
        for entry in &test.env {
            if let Some((key, value)) = entry.split_once('=') {
                cmd.env(key, value);
            }
        }

        let status = match cmd.status() {
            Ok(status) => status,
            Err(err) => {
                error!("{} - failed to spawn '{}': {err}", test.name, test.exe);
                summary.failed += 1;
                continue;
            }
        };

        let exited_ok = status.success();
        if exited_ok == test.should_fail() {
            error!(
                "{} - failed ({}{})",
                test.name,
                status.code().map_or_else(|| "signal".to_owned(), |c| c.to_string()),
                if test.should_fail() { ", expected failure" } else { "" },
            );
            summary.failed += 1;
        } else {
            info!("{} - success", test.name);
        }
    }

    Ok(summary)
}
