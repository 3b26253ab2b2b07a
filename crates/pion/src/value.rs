//! The tagged value union stored in the workspace arena.
//!
//! Every DSL value is one [`Value`] slot addressed by an [`ObjId`] handle.
//! Containers hold handles, never inline values, so target→deps→target
//! cycles cost nothing and destruction is a bulk free of the arena.

use indexmap::IndexMap;
use strum::{Display, EnumString, IntoStaticStr};

use crate::intern::StrId;

/// Non-zero handle into the value arena. Handle 0 is the shared null value,
/// allocated first at workspace construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjId(pub(crate) u32);

impl ObjId {
    /// The null value's handle.
    pub const NULL: Self = Self(0);

    /// Returns true for any handle other than null.
    #[must_use]
    pub fn is_some(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Discriminator for [`Value`]; used in diagnostics and argument checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    File,
    Array,
    Dict,
    BuildTarget,
    CustomTarget,
    Dependency,
    ExternalProgram,
    Compiler,
    FeatureOption,
    Machine,
    Meson,
    Test,
    OptionDescriptor,
}

/// An insertion-ordered dictionary keyed by string bytes.
///
/// Each entry remembers both the key's string-object handle (so iteration
/// can hand a real value to `foreach`) and the value handle.
#[derive(Debug, Default)]
pub struct Dict {
    entries: IndexMap<String, DictEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct DictEntry {
    pub key: ObjId,
    pub value: ObjId,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key_bytes: String, key: ObjId, value: ObjId) {
        self.entries.insert(key_bytes, DictEntry { key, value });
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<ObjId> {
        self.entries.get(key).map(|e| e.value)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, DictEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), *e))
    }
}

/// The kind of artifact a build target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Executable,
    StaticLibrary,
}

/// A compiled build target (`executable()` / `static_library()`).
#[derive(Debug, Clone)]
pub struct BuildTarget {
    /// User-facing name.
    pub name: StrId,
    /// Artifact file name (`name` for executables, `lib<name>.a` for
    /// static libraries).
    pub build_name: StrId,
    /// Absolute directory the artifact lands in; the project build dir or a
    /// subdirectory of it.
    pub build_dir: StrId,
    /// Absolute source directory of the declaring project.
    pub cwd: StrId,
    pub kind: TargetKind,
    /// Array of `file` values.
    pub src: ObjId,
    /// Array of directory `file` values, or null.
    pub include_dirs: ObjId,
    /// Array of strings, or null.
    pub c_args: ObjId,
    /// Array of dependency values, or null.
    pub deps: ObjId,
    /// Array of build targets / strings, or null.
    pub link_with: ObjId,
}

/// A user-defined command target (`custom_target()`).
#[derive(Debug, Clone)]
pub struct CustomTarget {
    pub name: StrId,
    /// Array of input `file` values.
    pub input: ObjId,
    /// Array of output `file` values.
    pub output: ObjId,
    /// The command executable, coerced to a string.
    pub cmd: ObjId,
    /// True when `cmd` names an artifact in the tree (a file or a built
    /// target) and the edge should carry an implicit dep on it; plain
    /// `PATH` names get none.
    pub cmd_is_artifact: bool,
    /// Array of command arguments (strings and files), not including the
    /// executable.
    pub args: ObjId,
    /// Route the command's stdout into the first output.
    pub capture: bool,
}

/// A resolved or unresolved dependency.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: StrId,
    pub version: StrId,
    pub found: bool,
    /// Array of directory `file` values, or null.
    pub include_directories: ObjId,
    /// Array of build targets / strings, or null.
    pub link_with: ObjId,
}

/// A program located on `PATH` (or not) by `find_program()`.
#[derive(Debug, Clone)]
pub struct ExternalProgram {
    pub name: StrId,
    pub full_path: StrId,
    pub found: bool,
}

/// The family a compiler belongs to; fixes the manifest rule template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerKind {
    Gcc,
}

impl CompilerKind {
    /// Per-compiler command template appended after the binary in the
    /// manifest rule.
    #[must_use]
    pub fn command(self) -> &'static str {
        match self {
            Self::Gcc => "$ARGS -MD -MQ $out -MF $DEPFILE -o $out -c $in",
        }
    }

    #[must_use]
    pub fn deps(self) -> &'static str {
        match self {
            Self::Gcc => "gcc",
        }
    }

    #[must_use]
    pub fn depfile(self) -> &'static str {
        match self {
            Self::Gcc => "$out.d",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Gcc => "Compiling C object $out",
        }
    }
}

/// A registered compiler for one language.
#[derive(Debug, Clone)]
pub struct Compiler {
    /// Compiler binary (name or path).
    pub name: StrId,
    pub kind: CompilerKind,
}

/// Tri-state of a `feature` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FeatureState {
    Enabled,
    Disabled,
    Auto,
}

/// A declared test case.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: StrId,
    /// Executable path, already coerced to a string.
    pub exe: StrId,
    /// Array of argument values, or null.
    pub args: ObjId,
    /// Array of `KEY=VAL` strings, or null.
    pub env: ObjId,
    pub should_fail: bool,
}

/// The type of a declared build option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum OptionType {
    String,
    Integer,
    Boolean,
    Combo,
    Feature,
    Array,
}

/// A declared option: its type, current value, and constraints.
#[derive(Debug, Clone)]
pub struct OptionDescriptor {
    pub kind: OptionType,
    /// Current (possibly overridden) value.
    pub value: ObjId,
    /// Allowed values for `combo` options.
    pub choices: Vec<String>,
    /// Inclusive bounds for `integer` options.
    pub min: Option<i64>,
    pub max: Option<i64>,
}

/// One arena slot.
#[derive(Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Number(i64),
    Str(StrId),
    /// An absolute normalized path.
    File(StrId),
    Array(Vec<ObjId>),
    Dict(Dict),
    BuildTarget(BuildTarget),
    CustomTarget(CustomTarget),
    Dependency(Dependency),
    ExternalProgram(ExternalProgram),
    Compiler(Compiler),
    FeatureOption(FeatureState),
    /// The `host_machine` receiver.
    Machine,
    /// The `meson` receiver.
    Meson,
    Test(TestCase),
    OptionDescriptor(OptionDescriptor),
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::Str(_) => ValueKind::String,
            Self::File(_) => ValueKind::File,
            Self::Array(_) => ValueKind::Array,
            Self::Dict(_) => ValueKind::Dict,
            Self::BuildTarget(_) => ValueKind::BuildTarget,
            Self::CustomTarget(_) => ValueKind::CustomTarget,
            Self::Dependency(_) => ValueKind::Dependency,
            Self::ExternalProgram(_) => ValueKind::ExternalProgram,
            Self::Compiler(_) => ValueKind::Compiler,
            Self::FeatureOption(_) => ValueKind::FeatureOption,
            Self::Machine => ValueKind::Machine,
            Self::Meson => ValueKind::Meson,
            Self::Test(_) => ValueKind::Test,
            Self::OptionDescriptor(_) => ValueKind::OptionDescriptor,
        }
    }
}
