//! Declared options, command-line overrides, and the derived compiler
//! flags the backend consumes.
//!
//! Options live per project as `option_descriptor` values in the project's
//! options dict. Universal options (buildtype, warning_level, …) are
//! declared for every project at creation; `option()` adds user options.
//! `-D` overrides are recorded up front and applied when the matching
//! declaration is evaluated; an override that never matches a declaration
//! fails the run.

use std::str::FromStr;

use crate::{
    args::ArgVal,
    diag::{DiagKind, Diagnostic, EvalResult, Span},
    value::{FeatureState, ObjId, OptionDescriptor, OptionType, Value},
    workspace::{Project, Workspace},
};

/// One `-Dname=value` (or `-Dsubproject:name=value`) request.
#[derive(Debug, Clone)]
pub struct OptionOverride {
    pub subproject: Option<String>,
    pub name: String,
    pub value: String,
    /// Set once a declaration consumed this override.
    pub used: bool,
}

impl OptionOverride {
    /// Parses the `name=value` form, with an optional `subproject:` prefix.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let Some((name, value)) = raw.split_once('=') else {
            return Err(format!("invalid option override '{raw}', expected name=value"));
        };
        if name.is_empty() {
            return Err(format!("invalid option override '{raw}', empty option name"));
        }
        let (subproject, name) = match name.split_once(':') {
            Some((sub, rest)) => (Some(sub.to_owned()), rest.to_owned()),
            None => (None, name.to_owned()),
        };
        Ok(Self {
            subproject,
            name,
            value: value.to_owned(),
            used: false,
        })
    }
}

/// The declared shape of one option: its type and value constraints.
#[derive(Debug, Clone)]
pub(crate) struct OptionSpec {
    pub name: String,
    pub ty: OptionType,
    /// Allowed values for combo options.
    pub choices: Vec<String>,
    /// Inclusive bounds for integer options.
    pub min: Option<i64>,
    pub max: Option<i64>,
}

/// Options every project carries without declaring them.
const UNIVERSAL: &[(&str, OptionType, &str, &[&str], Option<(i64, i64)>)] = &[
    (
        "buildtype",
        OptionType::Combo,
        "debug",
        &["plain", "debug", "debugoptimized", "release", "minsize", "custom"],
        None,
    ),
    ("optimization", OptionType::Combo, "0", &["0", "g", "1", "2", "3", "s"], None),
    ("debug", OptionType::Boolean, "true", &[], None),
    ("warning_level", OptionType::Integer, "1", &[], Some((0, 3))),
    (
        "c_std",
        OptionType::Combo,
        "none",
        &["none", "c89", "c99", "c11", "c17", "gnu89", "gnu99", "gnu11", "gnu17"],
        None,
    ),
    ("default_library", OptionType::Combo, "static", &["static"], None),
    ("prefix", OptionType::String, "/usr/local", &[], None),
];

fn is_universal(name: &str) -> bool {
    UNIVERSAL.iter().any(|(n, ..)| *n == name)
}

/// Declares the universal option set for a freshly-created project,
/// applying any matching overrides.
pub(crate) fn init_project_options(wk: &mut Workspace, proj_idx: usize) -> EvalResult<()> {
    let prev = wk.cur_project;
    wk.cur_project = proj_idx;
    for (name, ty, default, choices, bounds) in UNIVERSAL {
        let (min, max) = bounds.map_or((None, None), |(lo, hi)| (Some(lo), Some(hi)));
        let spec = OptionSpec {
            name: (*name).to_owned(),
            ty: *ty,
            choices: choices.iter().map(|c| (*c).to_owned()).collect(),
            min,
            max,
        };
        let value = parse_value(wk, &spec, default, None)?;
        insert_declared(wk, &spec, value, None)?;
    }
    wk.cur_project = prev;
    Ok(())
}

/// Declares a user option from `option()`. The initial value is the
/// matching override if one exists, otherwise the declared default,
/// otherwise the type's natural default.
pub(crate) fn declare(
    wk: &mut Workspace,
    span: Span,
    spec: &OptionSpec,
    default: Option<ArgVal>,
) -> EvalResult<ObjId> {
    if spec.ty == OptionType::Combo && spec.choices.is_empty() {
        return Err(Diagnostic::value(
            format!("combo option '{}' needs a choices: list", spec.name),
            span,
        ));
    }

    let value = match default {
        Some(arg) => coerce_declared_value(wk, spec, arg)?,
        None => {
            let fallback = natural_default(spec.ty, &spec.choices);
            parse_value(wk, spec, &fallback, Some(span))?
        }
    };

    insert_declared(wk, spec, value, Some(span))
}

/// Applies any pending override, stores the descriptor, and returns it.
fn insert_declared(
    wk: &mut Workspace,
    spec: &OptionSpec,
    default_value: ObjId,
    span: Option<Span>,
) -> EvalResult<ObjId> {
    let opts = wk.current_project().opts;
    if wk.dict_get(opts, &spec.name).is_some() {
        let msg = format!("option '{}' already declared", spec.name);
        return Err(span.map_or_else(
            || Diagnostic::bare(DiagKind::Value, msg.clone()),
            |s| Diagnostic::value(msg.clone(), s),
        ));
    }

    // An exact subproject match wins; universal options additionally fall
    // back to the unprefixed override so `-Dbuildtype=…` reaches
    // subprojects too. A consumed override stays matchable (one -D can
    // apply to every project), it is only flagged as used.
    let subproject = wk.current_project().subproject_name.clone();
    let found = wk
        .option_overrides
        .iter()
        .position(|ov| ov.name == spec.name && ov.subproject == subproject)
        .or_else(|| {
            if subproject.is_none() || !is_universal(&spec.name) {
                return None;
            }
            wk.option_overrides
                .iter()
                .position(|ov| ov.name == spec.name && ov.subproject.is_none())
        });
    let override_value = found.map(|i| {
        let ov = &mut wk.option_overrides[i];
        ov.used = true;
        ov.value.clone()
    });

    let value = match override_value {
        Some(raw) => parse_value(wk, spec, &raw, span)?,
        None => default_value,
    };

    let desc = wk.make_obj(Value::OptionDescriptor(OptionDescriptor {
        kind: spec.ty,
        value,
        choices: spec.choices.clone(),
        min: spec.min,
        max: spec.max,
    }));
    wk.dict_insert(opts, &spec.name, desc);
    Ok(desc)
}

fn natural_default(ty: OptionType, choices: &[String]) -> String {
    match ty {
        OptionType::String | OptionType::Array => String::new(),
        OptionType::Integer => "0".to_owned(),
        OptionType::Boolean => "true".to_owned(),
        OptionType::Combo => choices.first().cloned().unwrap_or_default(),
        OptionType::Feature => "auto".to_owned(),
    }
}

/// Parses an override (or textual default) into a typed value.
fn parse_value(wk: &mut Workspace, spec: &OptionSpec, raw: &str, span: Option<Span>) -> EvalResult<ObjId> {
    let name = spec.name.as_str();
    let fail = |msg: String| {
        span.map_or_else(
            || Diagnostic::bare(DiagKind::Value, msg.clone()),
            |s| Diagnostic::value(msg.clone(), s),
        )
    };
    match spec.ty {
        OptionType::String => Ok(wk.make_str(raw)),
        OptionType::Integer => {
            let n: i64 = raw
                .parse()
                .map_err(|_| fail(format!("option '{name}' expects an integer, got '{raw}'")))?;
            check_bounds(spec, n).map_err(fail)?;
            Ok(wk.make_number(n))
        }
        OptionType::Boolean => match raw {
            "true" => Ok(wk.make_bool(true)),
            "false" => Ok(wk.make_bool(false)),
            _ => Err(fail(format!("option '{name}' expects true or false, got '{raw}'"))),
        },
        OptionType::Combo => {
            if spec.choices.iter().any(|c| c == raw) {
                Ok(wk.make_str(raw))
            } else {
                Err(fail(format!(
                    "option '{name}' expects one of [{}], got '{raw}'",
                    spec.choices.join(", ")
                )))
            }
        }
        OptionType::Feature => FeatureState::from_str(raw).map_or_else(
            |_| {
                Err(fail(format!(
                    "option '{name}' expects enabled, disabled, or auto, got '{raw}'"
                )))
            },
            |state| Ok(wk.make_obj(Value::FeatureOption(state))),
        ),
        OptionType::Array => {
            let parts: Vec<String> = raw.split(',').filter(|p| !p.is_empty()).map(str::to_owned).collect();
            let items: Vec<ObjId> = parts.iter().map(|p| wk.make_str(p)).collect();
            Ok(wk.make_array(items))
        }
    }
}

/// Type-checks a `value:` keyword written in the DSL against the declared
/// option type.
fn coerce_declared_value(wk: &mut Workspace, spec: &OptionSpec, arg: ArgVal) -> EvalResult<ObjId> {
    match (spec.ty, wk.get_obj(arg.obj)) {
        (OptionType::String, Value::Str(_)) => Ok(arg.obj),
        (OptionType::Integer, Value::Number(n)) => {
            let n = *n;
            check_bounds(spec, n).map_err(|msg| Diagnostic::value(msg, arg.span))?;
            Ok(arg.obj)
        }
        (OptionType::Boolean, Value::Bool(_)) => Ok(arg.obj),
        (OptionType::Combo | OptionType::Feature, Value::Str(s)) => {
            let raw = wk.str(*s).to_owned();
            parse_value(wk, spec, &raw, Some(arg.span))
        }
        (OptionType::Array, Value::Array(items)) => {
            for item in items.clone() {
                wk.expect_kind(item, crate::value::ValueKind::String, arg.span)?;
            }
            Ok(arg.obj)
        }
        (_, other) => Err(Diagnostic::type_error(
            format!(
                "option '{}' of type {} cannot take a {} value",
                spec.name,
                spec.ty,
                other.kind()
            ),
            arg.span,
        )),
    }
}

fn check_bounds(spec: &OptionSpec, n: i64) -> Result<(), String> {
    if let Some(lo) = spec.min
        && n < lo
    {
        return Err(format!("option '{}' value {n} is below the minimum {lo}", spec.name));
    }
    if let Some(hi) = spec.max
        && n > hi
    {
        return Err(format!("option '{}' value {n} is above the maximum {hi}", spec.name));
    }
    Ok(())
}

/// Re-declares an option's default from `project(default_options: …)`.
/// Explicit `-D` overrides win over project defaults.
pub(crate) fn set_default(wk: &mut Workspace, span: Span, entry: &str) -> EvalResult<()> {
    let Some((name, raw)) = entry.split_once('=') else {
        return Err(Diagnostic::value(
            format!("invalid default_options entry '{entry}', expected name=value"),
            span,
        ));
    };
    let subproject = wk.current_project().subproject_name.clone();
    let overridden = wk
        .option_overrides
        .iter()
        .any(|ov| ov.name == name && (ov.subproject == subproject || ov.subproject.is_none()));
    if overridden {
        return Ok(());
    }

    let opts = wk.current_project().opts;
    let Some(desc_id) = wk.dict_get(opts, name) else {
        // Defaults for options this project never declares are ignored,
        // matching the reference tool.
        return Ok(());
    };
    let Value::OptionDescriptor(desc) = wk.get_obj(desc_id) else {
        return Err(Diagnostic::internal(format!("option '{name}' is not a descriptor")));
    };
    let spec = OptionSpec {
        name: name.to_owned(),
        ty: desc.kind,
        choices: desc.choices.clone(),
        min: desc.min,
        max: desc.max,
    };
    let value = parse_value(wk, &spec, raw, Some(span))?;
    let Value::OptionDescriptor(desc) = wk.get_obj_mut(desc_id) else {
        unreachable!("kind checked above");
    };
    desc.value = value;
    Ok(())
}

/// Reads an option's current value in the given project.
#[must_use]
pub(crate) fn option_value(wk: &Workspace, proj: &Project, name: &str) -> Option<ObjId> {
    let desc_id = wk.dict_get(proj.opts, name)?;
    match wk.get_obj(desc_id) {
        Value::OptionDescriptor(desc) => Some(desc.value),
        _ => None,
    }
}

/// `get_option()` against the current project.
pub(crate) fn get_option(wk: &Workspace, name: &str, span: Span) -> EvalResult<ObjId> {
    option_value(wk, wk.current_project(), name)
        .ok_or_else(|| Diagnostic::name(format!("undefined option '{name}'"), span))
}

/// Fails the run if any `-D` override never matched a declaration.
pub(crate) fn check_unused_overrides(wk: &Workspace) -> EvalResult<()> {
    for ov in &wk.option_overrides {
        if !ov.used {
            return Err(Diagnostic::bare(DiagKind::Value, format!("unknown option '{}'", ov.name)));
        }
    }
    Ok(())
}

// ----- derived compiler flags -----

fn option_str<'wk>(wk: &'wk Workspace, proj: &Project, name: &str) -> EvalResult<&'wk str> {
    let id = option_value(wk, proj, name)
        .ok_or_else(|| Diagnostic::internal(format!("universal option '{name}' missing")))?;
    match wk.get_obj(id) {
        Value::Str(s) => Ok(wk.str(*s)),
        other => Err(Diagnostic::internal(format!(
            "option '{name}' holds a {} value",
            other.kind()
        ))),
    }
}

/// Buildtype-derived optimization flags.
pub(crate) fn optimization_flag(wk: &Workspace, proj: &Project) -> EvalResult<String> {
    let buildtype = option_str(wk, proj, "buildtype")?;
    let flag = match buildtype {
        "plain" => "-O0",
        "debug" => "-g",
        "debugoptimized" => "-g -Og",
        "release" => "-O3",
        "minsize" => "-Os",
        "custom" => {
            let opt = option_str(wk, proj, "optimization")?;
            let debug = matches!(
                option_value(wk, proj, "debug").map(|id| wk.get_obj(id)),
                Some(Value::Bool(true))
            );
            let mut flag = format!("-O{opt}");
            if debug {
                flag.push_str(" -g");
            }
            return Ok(flag);
        }
        other => {
            return Err(Diagnostic::internal(format!("invalid build type '{other}'")));
        }
    };
    Ok(flag.to_owned())
}

/// Warning level 0–3 to `-W` flags.
pub(crate) fn warning_flag(wk: &Workspace, proj: &Project) -> EvalResult<&'static str> {
    let id = option_value(wk, proj, "warning_level")
        .ok_or_else(|| Diagnostic::internal("universal option 'warning_level' missing"))?;
    let Value::Number(lvl) = wk.get_obj(id) else {
        return Err(Diagnostic::internal("warning_level holds a non-number value"));
    };
    match lvl {
        0 => Ok(""),
        1 => Ok("-Wall"),
        2 => Ok("-Wall -Wextra"),
        3 => Ok("-Wall -Wextra -Wpedantic"),
        other => Err(Diagnostic::internal(format!("invalid warning level {other}"))),
    }
}

/// `c_std` to a `-std=` flag; `none` yields the empty string.
pub(crate) fn std_flag(wk: &Workspace, proj: &Project) -> EvalResult<String> {
    let std = option_str(wk, proj, "c_std")?;
    if std == "none" {
        Ok(String::new())
    } else {
        Ok(format!("-std={std}"))
    }
}

/// Serializes an option value back into override syntax for the setup
/// record round-trip.
#[must_use]
pub(crate) fn value_to_override_string(wk: &Workspace, id: ObjId) -> String {
    match wk.get_obj(id) {
        Value::Str(s) => wk.str(*s).to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_owned(),
        Value::FeatureOption(state) => state.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| wk.obj_display(*item))
            .collect::<Vec<_>>()
            .join(","),
        _ => wk.obj_display(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Workspace {
        let mut wk = Workspace::new();
        let idx = wk.make_project(None, "/src", "/build");
        init_project_options(&mut wk, idx).unwrap();
        wk
    }

    fn combo_spec(name: &str, choices: &[&str]) -> OptionSpec {
        OptionSpec {
            name: name.to_owned(),
            ty: OptionType::Combo,
            choices: choices.iter().map(|c| (*c).to_owned()).collect(),
            min: None,
            max: None,
        }
    }

    #[test]
    fn override_parse_forms() {
        let ov = OptionOverride::parse("x=1").unwrap();
        assert_eq!((ov.subproject, ov.name.as_str(), ov.value.as_str()), (None, "x", "1"));
        let ov = OptionOverride::parse("sub:x=a=b").unwrap();
        assert_eq!(ov.subproject.as_deref(), Some("sub"));
        assert_eq!(ov.value, "a=b");
        assert!(OptionOverride::parse("nope").is_err());
    }

    #[test]
    fn universal_options_have_defaults() {
        let wk = fresh();
        let proj = wk.current_project();
        let buildtype = option_value(&wk, proj, "buildtype").unwrap();
        assert_eq!(wk.objstr(buildtype), "debug");
        let lvl = option_value(&wk, proj, "warning_level").unwrap();
        assert!(matches!(wk.get_obj(lvl), Value::Number(1)));
    }

    #[test]
    fn combo_override_must_be_a_choice() {
        let mut wk = Workspace::new();
        wk.option_overrides.push(OptionOverride::parse("buildtype=bogus").unwrap());
        let idx = wk.make_project(None, "/src", "/build");
        let err = init_project_options(&mut wk, idx).unwrap_err();
        assert_eq!(err.kind, DiagKind::Value);
        assert!(err.msg.contains("bogus"));
    }

    #[test]
    fn integer_override_is_bounds_checked() {
        let mut wk = Workspace::new();
        wk.option_overrides.push(OptionOverride::parse("warning_level=7").unwrap());
        let idx = wk.make_project(None, "/src", "/build");
        let err = init_project_options(&mut wk, idx).unwrap_err();
        assert_eq!(err.kind, DiagKind::Value);
    }

    #[test]
    fn user_option_takes_override() {
        let mut wk = fresh();
        wk.option_overrides.push(OptionOverride::parse("mode=b").unwrap());
        declare(&mut wk, Span::default(), &combo_spec("mode", &["a", "b"]), None).unwrap();
        let v = get_option(&wk, "mode", Span::default()).unwrap();
        assert_eq!(wk.objstr(v), "b");
        assert!(wk.option_overrides[0].used);
    }

    #[test]
    fn bad_combo_override_on_user_option_fails_at_declaration() {
        let mut wk = fresh();
        wk.option_overrides.push(OptionOverride::parse("x=c").unwrap());
        let err = declare(&mut wk, Span::default(), &combo_spec("x", &["a", "b"]), None).unwrap_err();
        assert_eq!(err.kind, DiagKind::Value);
    }

    #[test]
    fn unused_override_is_reported() {
        let mut wk = fresh();
        wk.option_overrides.push(OptionOverride::parse("nosuch=1").unwrap());
        let err = check_unused_overrides(&wk).unwrap_err();
        assert!(err.msg.contains("nosuch"));
    }

    #[test]
    fn buildtype_flag_table() {
        for (buildtype, flag) in [
            ("plain", "-O0"),
            ("debug", "-g"),
            ("debugoptimized", "-g -Og"),
            ("release", "-O3"),
            ("minsize", "-Os"),
        ] {
            let mut wk = Workspace::new();
            wk.option_overrides
                .push(OptionOverride::parse(&format!("buildtype={buildtype}")).unwrap());
            let idx = wk.make_project(None, "/src", "/build");
            init_project_options(&mut wk, idx).unwrap();
            assert_eq!(optimization_flag(&wk, wk.current_project()).unwrap(), flag);
        }
    }

    #[test]
    fn custom_buildtype_combines_optimization_and_debug() {
        let mut wk = Workspace::new();
        wk.option_overrides = vec![
            OptionOverride::parse("buildtype=custom").unwrap(),
            OptionOverride::parse("optimization=s").unwrap(),
            OptionOverride::parse("debug=true").unwrap(),
        ];
        let idx = wk.make_project(None, "/src", "/build");
        init_project_options(&mut wk, idx).unwrap();
        assert_eq!(optimization_flag(&wk, wk.current_project()).unwrap(), "-Os -g");
    }

    #[test]
    fn warning_and_std_flags() {
        let mut wk = Workspace::new();
        wk.option_overrides = vec![
            OptionOverride::parse("warning_level=2").unwrap(),
            OptionOverride::parse("c_std=c11").unwrap(),
        ];
        let idx = wk.make_project(None, "/src", "/build");
        init_project_options(&mut wk, idx).unwrap();
        assert_eq!(warning_flag(&wk, wk.current_project()).unwrap(), "-Wall -Wextra");
        assert_eq!(std_flag(&wk, wk.current_project()).unwrap(), "-std=c11");
    }

    #[test]
    fn default_options_yield_to_explicit_overrides() {
        let mut wk = Workspace::new();
        wk.option_overrides = vec![OptionOverride::parse("buildtype=release").unwrap()];
        let idx = wk.make_project(None, "/src", "/build");
        init_project_options(&mut wk, idx).unwrap();
        set_default(&mut wk, Span::default(), "buildtype=minsize").unwrap();
        let v = option_value(&wk, wk.current_project(), "buildtype").unwrap();
        assert_eq!(wk.objstr(v), "release");
    }

    #[test]
    fn default_options_apply_without_overrides() {
        let mut wk = fresh();
        set_default(&mut wk, Span::default(), "buildtype=minsize").unwrap();
        let v = option_value(&wk, wk.current_project(), "buildtype").unwrap();
        assert_eq!(wk.objstr(v), "minsize");
    }

    #[test]
    fn override_round_trip_strings() {
        let mut wk = fresh();
        let arr_a = wk.make_str("a");
        let arr_b = wk.make_str("b");
        let arr = wk.make_array(vec![arr_a, arr_b]);
        assert_eq!(value_to_override_string(&wk, arr), "a,b");
        let b = wk.make_bool(false);
        assert_eq!(value_to_override_string(&wk, b), "false");
    }
}
