//! The workspace: one value arena, one string pool, the project list, and
//! everything the evaluator mutates and the backend later reads.
//!
//! Exactly one workspace exists per invocation. It is constructed, mutated
//! during evaluation, read by the backend writer, and dropped at exit.

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use ahash::AHashMap;

use crate::{
    diag::{Diagnostic, EvalResult, SourceFile, Span},
    intern::{StrId, StrPool},
    options::OptionOverride,
    output::PRIVATE_DIR,
    path,
    value::{Dict, ObjId, Value, ValueKind},
};

/// Per-project configuration filled in by `project()`.
#[derive(Debug, Default)]
pub struct ProjectConfig {
    pub name: StrId,
    pub version: StrId,
    pub license: StrId,
}

/// One unit of DSL evaluation: the main project or a subproject.
#[derive(Debug)]
pub struct Project {
    pub subproject_name: Option<String>,
    /// Absolute source directory.
    pub cwd: StrId,
    /// Absolute build directory.
    pub build_dir: StrId,
    /// Identifier bindings local to this project.
    pub scope: AHashMap<String, ObjId>,
    /// Dict: option name → option descriptor.
    pub opts: ObjId,
    /// Array of build and custom targets, in declaration order.
    pub targets: ObjId,
    /// Array of tests, in declaration order.
    pub tests: ObjId,
    /// Dict: language → compiler.
    pub compilers: ObjId,
    /// Array of project-wide default compile args.
    pub args: ObjId,
    pub cfg: ProjectConfig,
}

/// The whole evaluation state. See module docs.
#[derive(Debug)]
pub struct Workspace {
    objs: Vec<Value>,
    strs: StrPool,
    /// Workspace-global bindings (`meson`, `host_machine`).
    pub scope: AHashMap<String, ObjId>,
    pub projects: Vec<Project>,
    pub cur_project: usize,
    pub option_overrides: Vec<OptionOverride>,
    /// Source files evaluated so far; feeds diagnostics and the
    /// regenerate edge.
    pub sources: Vec<SourceFile>,
    pub source_root: PathBuf,
    pub build_root: PathBuf,
    pub private_dir: PathBuf,
    /// How this tool was invoked; embedded in regenerate and capture
    /// command lines.
    pub argv0: String,
    /// True while re-evaluating a setup record; gates the `setup()`
    /// function.
    pub(crate) in_regen: bool,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        let mut wk = Self {
            objs: Vec::with_capacity(1024),
            strs: StrPool::new(),
            scope: AHashMap::new(),
            projects: Vec::new(),
            cur_project: 0,
            option_overrides: Vec::new(),
            sources: Vec::new(),
            source_root: PathBuf::new(),
            build_root: PathBuf::new(),
            private_dir: PathBuf::new(),
            argv0: String::new(),
            in_regen: false,
        };

        let null = wk.make_obj(Value::Null);
        debug_assert_eq!(null, ObjId::NULL);

        let meson = wk.make_obj(Value::Meson);
        wk.scope.insert("meson".to_owned(), meson);
        let machine = wk.make_obj(Value::Machine);
        wk.scope.insert("host_machine".to_owned(), machine);

        wk
    }

    /// Resolves the source root, build root, and private directory, and
    /// remembers `argv0` for re-entry command lines. Creates the build and
    /// private directories.
    pub fn setup_dirs(&mut self, source_root: &Path, build_dir: &Path, argv0: &str) -> EvalResult<()> {
        self.source_root = path::make_absolute(source_root)?;
        self.build_root = path::make_absolute(build_dir)?;
        self.private_dir = self.build_root.join(PRIVATE_DIR);

        self.argv0 = if path::is_basename(argv0) {
            argv0.to_owned()
        } else {
            path::make_absolute(Path::new(argv0))?.to_string_lossy().into_owned()
        };

        path::mkdir_p(&self.private_dir)?;
        Ok(())
    }

    // ----- value arena -----

    pub fn make_obj(&mut self, value: Value) -> ObjId {
        let id = ObjId(u32::try_from(self.objs.len()).expect("value arena exceeds u32 range"));
        self.objs.push(value);
        id
    }

    /// O(1) lookup. A dangling handle is an internal bug, not user error.
    #[must_use]
    pub fn get_obj(&self, id: ObjId) -> &Value {
        &self.objs[id.index()]
    }

    pub fn get_obj_mut(&mut self, id: ObjId) -> &mut Value {
        &mut self.objs[id.index()]
    }

    // ----- string pool -----

    pub fn str_push(&mut self, s: &str) -> StrId {
        self.strs.push(s)
    }

    pub fn str_pushn(&mut self, s: &str, n: usize) -> StrId {
        self.strs.pushn(s, n)
    }

    pub fn str_pushf(&mut self, args: std::fmt::Arguments<'_>) -> StrId {
        self.strs.pushf(args)
    }

    pub fn str_push_stripped(&mut self, s: &str) -> StrId {
        self.strs.push_stripped(s)
    }

    pub fn str_app(&mut self, id: &mut StrId, s: &str) {
        self.strs.app(id, s);
    }

    pub fn str_appf(&mut self, id: &mut StrId, args: std::fmt::Arguments<'_>) {
        self.strs.appf(id, args);
    }

    #[must_use]
    pub fn str(&self, id: StrId) -> &str {
        self.strs.get(id)
    }

    /// The contents of a string value.
    #[must_use]
    pub fn objstr(&self, id: ObjId) -> &str {
        match self.get_obj(id) {
            Value::Str(s) => self.str(*s),
            other => panic!("objstr on {} value", other.kind()),
        }
    }

    /// The path held by a file value.
    #[must_use]
    pub fn file_path(&self, id: ObjId) -> &str {
        match self.get_obj(id) {
            Value::File(s) => self.str(*s),
            other => panic!("file_path on {} value", other.kind()),
        }
    }

    /// Splits `s` at any byte in `seps`, skipping empty fragments, and
    /// returns an array of strings. This is the whitespace-ish splitter
    /// used for override parsing, not the `split()` method.
    pub fn str_split_any(&mut self, s: &str, seps: &str) -> ObjId {
        let parts: Vec<String> = s
            .split(|c: char| seps.contains(c))
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect();
        let items: Vec<ObjId> = parts.iter().map(|p| self.make_str(p)).collect();
        self.make_obj(Value::Array(items))
    }

    // ----- construction helpers -----

    pub fn make_str(&mut self, s: &str) -> ObjId {
        let sid = self.strs.push(s);
        self.make_obj(Value::Str(sid))
    }

    pub fn make_bool(&mut self, b: bool) -> ObjId {
        self.make_obj(Value::Bool(b))
    }

    pub fn make_number(&mut self, n: i64) -> ObjId {
        self.make_obj(Value::Number(n))
    }

    pub fn make_array(&mut self, items: Vec<ObjId>) -> ObjId {
        self.make_obj(Value::Array(items))
    }

    pub fn make_file(&mut self, abs_path: &str) -> ObjId {
        let sid = self.strs.push(abs_path);
        self.make_obj(Value::File(sid))
    }

    pub fn make_dict(&mut self) -> ObjId {
        self.make_obj(Value::Dict(Dict::new()))
    }

    // ----- container helpers -----

    pub fn array_push(&mut self, arr: ObjId, item: ObjId) {
        match self.get_obj_mut(arr) {
            Value::Array(items) => items.push(item),
            other => panic!("array_push on {} value", other.kind()),
        }
    }

    pub fn array_extend(&mut self, arr: ObjId, tail: &[ObjId]) {
        match self.get_obj_mut(arr) {
            Value::Array(items) => items.extend_from_slice(tail),
            other => panic!("array_extend on {} value", other.kind()),
        }
    }

    /// Clones out the element handles so the caller can keep mutating the
    /// workspace while iterating.
    #[must_use]
    pub fn array_items(&self, arr: ObjId) -> Vec<ObjId> {
        match self.get_obj(arr) {
            Value::Array(items) => items.clone(),
            other => panic!("array_items on {} value", other.kind()),
        }
    }

    /// Recursively flattens nested arrays into a single list of handles.
    #[must_use]
    pub fn array_flatten(&self, id: ObjId) -> Vec<ObjId> {
        let mut out = Vec::new();
        self.flatten_into(id, &mut out);
        out
    }

    fn flatten_into(&self, id: ObjId, out: &mut Vec<ObjId>) {
        match self.get_obj(id) {
            Value::Array(items) => {
                for item in items {
                    self.flatten_into(*item, out);
                }
            }
            _ => out.push(id),
        }
    }

    pub fn dict_insert(&mut self, dict: ObjId, key: &str, value: ObjId) {
        let key_obj = self.make_str(key);
        match self.get_obj_mut(dict) {
            Value::Dict(d) => d.insert(key.to_owned(), key_obj, value),
            other => panic!("dict_insert on {} value", other.kind()),
        }
    }

    #[must_use]
    pub fn dict_get(&self, dict: ObjId, key: &str) -> Option<ObjId> {
        match self.get_obj(dict) {
            Value::Dict(d) => d.get(key),
            other => panic!("dict_get on {} value", other.kind()),
        }
    }

    /// Dict entries as (key bytes, key handle, value handle), insertion
    /// order, cloned out for borrow-free iteration.
    #[must_use]
    pub fn dict_entries(&self, dict: ObjId) -> Vec<(String, ObjId, ObjId)> {
        match self.get_obj(dict) {
            Value::Dict(d) => d.iter().map(|(k, e)| (k.to_owned(), e.key, e.value)).collect(),
            other => panic!("dict_entries on {} value", other.kind()),
        }
    }

    // ----- comparison and display -----

    /// Structural equality: same kind, same payload. Strings and files by
    /// bytes, arrays element-wise, everything else by identity-free value.
    #[must_use]
    pub fn obj_equal(&self, a: ObjId, b: ObjId) -> bool {
        if a == b {
            return true;
        }
        match (self.get_obj(a), self.get_obj(b)) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => self.str(*x) == self.str(*y),
            (Value::File(x), Value::File(y)) => self.str(*x) == self.str(*y),
            (Value::Array(x), Value::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y.iter()).all(|(i, j)| self.obj_equal(*i, *j))
            }
            _ => false,
        }
    }

    /// Renders a value in DSL literal syntax. Used by the setup record,
    /// `message()`, and diagnostics.
    #[must_use]
    pub fn obj_to_s(&self, id: ObjId) -> String {
        let mut out = String::new();
        self.obj_to_s_into(id, &mut out);
        out
    }

    fn obj_to_s_into(&self, id: ObjId, out: &mut String) {
        match self.get_obj(id) {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => {
                let _ = write!(out, "{n}");
            }
            Value::Str(s) => {
                let _ = write!(out, "'{}'", self.str(*s).replace('\\', "\\\\").replace('\'', "\\'"));
            }
            Value::File(s) => {
                let _ = write!(out, "'{}'", self.str(*s).replace('\\', "\\\\").replace('\'', "\\'"));
            }
            Value::FeatureOption(state) => {
                let _ = write!(out, "'{state}'");
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.obj_to_s_into(*item, out);
                }
                out.push(']');
            }
            Value::Dict(d) => {
                out.push('{');
                for (i, (k, entry)) in d.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "'{k}': ");
                    self.obj_to_s_into(entry.value, out);
                }
                out.push('}');
            }
            Value::OptionDescriptor(opt) => self.obj_to_s_into(opt.value, out),
            other => {
                let _ = write!(out, "<{}>", other.kind());
            }
        }
    }

    /// User-facing plain-text rendering: strings lose their quotes,
    /// everything else matches [`Workspace::obj_to_s`].
    #[must_use]
    pub fn obj_display(&self, id: ObjId) -> String {
        match self.get_obj(id) {
            Value::Str(s) | Value::File(s) => self.str(*s).to_owned(),
            _ => self.obj_to_s(id),
        }
    }

    // ----- projects and scopes -----

    /// Appends a project. The first project created is the main project.
    pub fn make_project(&mut self, subproject_name: Option<&str>, cwd: &str, build_dir: &str) -> usize {
        let cwd = self.strs.push(cwd);
        let build_dir = self.strs.push(build_dir);
        let opts = self.make_dict();
        let targets = self.make_array(Vec::new());
        let tests = self.make_array(Vec::new());
        let compilers = self.make_dict();
        let args = self.make_array(Vec::new());

        self.projects.push(Project {
            subproject_name: subproject_name.map(str::to_owned),
            cwd,
            build_dir,
            scope: AHashMap::with_capacity(64),
            opts,
            targets,
            tests,
            compilers,
            args,
            cfg: ProjectConfig::default(),
        });
        self.projects.len() - 1
    }

    #[must_use]
    pub fn current_project(&self) -> &Project {
        &self.projects[self.cur_project]
    }

    pub fn current_project_mut(&mut self) -> &mut Project {
        let idx = self.cur_project;
        &mut self.projects[idx]
    }

    /// Name resolution: current-project scope, then the workspace globals.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ObjId> {
        self.current_project()
            .scope
            .get(name)
            .or_else(|| self.scope.get(name))
            .copied()
    }

    /// Assignment always binds in the current project's scope.
    pub fn assign(&mut self, name: &str, value: ObjId) {
        self.current_project_mut().scope.insert(name.to_owned(), value);
    }

    // ----- sources -----

    /// Registers an evaluated source file; its index feeds [`Span::file`].
    pub fn add_source(&mut self, name: String, text: String) -> u32 {
        self.sources.push(SourceFile { name, text });
        u32::try_from(self.sources.len() - 1).expect("source table exceeds u32 range")
    }

    /// Type guard used by the evaluator and coercion layer.
    pub fn expect_kind(&self, id: ObjId, want: ValueKind, span: Span) -> EvalResult<()> {
        let got = self.get_obj(id).kind();
        if got == want {
            Ok(())
        } else {
            Err(Diagnostic::type_error(format!("expected {want}, got {got}"), span))
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
