//! The setup driver: evaluates a source tree into a workspace and hands it
//! to the backend writer.
//!
//! Two entry paths exist: a fresh `setup` against a source tree, and
//! `regenerate`, which replays the setup record written into the private
//! directory so the manifest's REGENERATE_BUILD edge can re-run the tool
//! with the original roots and option overrides.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    diag::{DiagKind, Diagnostic, SourceFile},
    interp, options, output,
    options::OptionOverride,
    workspace::Workspace,
};

/// Everything a setup run needs from the caller.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Directory holding the root `meson.build`.
    pub source_root: PathBuf,
    /// Build directory; created if missing.
    pub build_dir: PathBuf,
    /// How the tool was invoked; baked into re-entry command lines.
    pub argv0: String,
    /// Parsed `-D` overrides.
    pub overrides: Vec<OptionOverride>,
}

/// A failed run, rendered and ready for stderr.
#[derive(Debug)]
pub struct Error {
    pub kind: DiagKind,
    rendered: String,
}

impl Error {
    pub(crate) fn new(diag: &Diagnostic, sources: &[SourceFile]) -> Self {
        Self {
            kind: diag.kind,
            rendered: diag.render(sources),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl std::error::Error for Error {}

/// Evaluates the source tree without writing any artifacts.
pub fn evaluate(inv: &Invocation) -> Result<Workspace, Error> {
    let mut wk = Workspace::new();
    match evaluate_into(&mut wk, inv) {
        Ok(()) => Ok(wk),
        Err(diag) => Err(Error::new(&diag, &wk.sources)),
    }
}

/// Evaluates the source tree and writes all backend artifacts.
pub fn setup_build(inv: &Invocation) -> Result<Workspace, Error> {
    let mut wk = Workspace::new();
    match evaluate_into(&mut wk, inv).and_then(|()| output::write_all(&wk)) {
        Ok(()) => {
            info!("wrote {}", wk.build_root.join("build.ninja").display());
            Ok(wk)
        }
        Err(diag) => Err(Error::new(&diag, &wk.sources)),
    }
}

fn evaluate_into(wk: &mut Workspace, inv: &Invocation) -> Result<(), Diagnostic> {
    wk.option_overrides.clone_from(&inv.overrides);
    wk.setup_dirs(&inv.source_root, &inv.build_dir, &inv.argv0)?;
    eval_tree(wk)
}

/// Creates the main project and evaluates `meson_options.txt` (when
/// present) followed by `meson.build`. The roots must already be set.
fn eval_tree(wk: &mut Workspace) -> Result<(), Diagnostic> {
    let source_root = wk.source_root.clone();
    let idx = wk.make_project(
        None,
        &source_root.to_string_lossy(),
        &wk.build_root.to_string_lossy().into_owned(),
    );
    options::init_project_options(wk, idx)?;

    let options_file = source_root.join("meson_options.txt");
    if options_file.is_file() {
        let text = read_source(&options_file)?;
        interp::eval_source(wk, &options_file.to_string_lossy(), &text)?;
    }

    let build_file = source_root.join("meson.build");
    let text = read_source(&build_file)?;
    interp::eval_source(wk, &build_file.to_string_lossy(), &text)?;

    options::check_unused_overrides(wk)
}

fn read_source(path: &Path) -> Result<String, Diagnostic> {
    fs::read_to_string(path).map_err(|err| Diagnostic::io(format!("cannot read '{}': {err}", path.display())))
}

/// Re-entry: replays a setup record and regenerates all artifacts.
///
/// The record is an ordinary DSL file whose single `setup()` call restores
/// the source root, build root, and option overrides; everything after
/// that is a normal setup run.
pub fn regenerate(config: &Path, argv0: &str) -> Result<Workspace, Error> {
    let mut wk = Workspace::new();
    match regenerate_into(&mut wk, config, argv0) {
        Ok(()) => Ok(wk),
        Err(diag) => Err(Error::new(&diag, &wk.sources)),
    }
}

fn regenerate_into(wk: &mut Workspace, config: &Path, argv0: &str) -> Result<(), Diagnostic> {
    let config = crate::path::make_absolute(config)?;
    let text = read_source(&config)?;

    wk.in_regen = true;
    interp::eval_source(wk, &config.to_string_lossy(), &text)?;
    wk.in_regen = false;

    if wk.build_root.as_os_str().is_empty() || wk.source_root.as_os_str().is_empty() {
        return Err(Diagnostic::io(format!(
            "'{}' is not a setup record: it never called setup()",
            config.display()
        )));
    }

    wk.argv0 = argv0.to_owned();
    crate::path::mkdir_p(&wk.private_dir)?;

    // The record itself is not part of the evaluated tree; drop it from
    // the source table so the regenerate edge lists only build files.
    wk.sources.clear();

    eval_tree(wk)?;
    output::write_all(wk)
}
