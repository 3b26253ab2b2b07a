#![doc = include_str!("../../../README.md")]

mod args;
mod coerce;
mod diag;
mod functions;
mod interp;
mod intern;
mod options;
mod output;
mod parse;
mod path;
mod runner;
mod serial;
mod setup;
mod value;
mod workspace;

pub use crate::{
    diag::{DiagKind, Diagnostic, SourceFile, Span},
    intern::StrId,
    options::OptionOverride,
    output::{PRIVATE_DIR, SETUP_FILE, TESTS_FILE},
    runner::{TestSummary, run_tests},
    serial::{LoadError, TEST_FLAG_SHOULD_FAIL, TestRecord, load_tests, write_tests},
    setup::{Error, Invocation, evaluate, regenerate, setup_build},
    value::{ObjId, Value, ValueKind},
    workspace::{Project, Workspace},
};
