//! Optional syntax lowering applied to a template body before rewriting.
//!
//! Template authors may write modern syntax inside `<% %>` blocks; lowering
//! it first keeps the output loadable by older engines. Any
//! `Fn(&str) -> Result<String, BoxError>` works as a [`Lowering`]; [`Es2015`]
//! is the bundled swc-based one.
use crate::error::BoxError;
use crate::*;
use serde::Deserialize;
use swc_common::{GLOBALS, Globals, Mark, comments::SingleThreadedComments};
use swc_ecma_ast::{Pass, Program};
use swc_ecma_transforms_base::{
    fixer::fixer,
    helpers::{HELPERS, Helpers, inject_helpers},
    hygiene::hygiene,
    resolver,
};

/// A source-to-source transform run on the interior of a compiled template.
pub trait Lowering {
    fn lower(&self, body: &str) -> Result<String, BoxError>;
}
impl<F> Lowering for F
where
    F: Fn(&str) -> Result<String, BoxError>,
{
    fn lower(&self, body: &str) -> Result<String, BoxError> {
        self(body)
    }
}

/// Lowers ES2015+ syntax (arrows, classes, destructuring, template
/// literals...) to ES5.
///
/// Configured with a babel-style object. Only `presets` is read: when it is
/// present and names neither `es2015` nor `env`, the body is only reparsed
/// and reprinted. Other keys are ignored.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Es2015 {
    /// Whether the ES2015 pass runs.
    pub run_es2015: bool,
}
impl Default for Es2015 {
    fn default() -> Self {
        Self { run_es2015: true }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BabelConfig {
    presets: Option<Vec<Preset>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Preset {
    Name(String),
    WithOptions(String, serde_json::Value),
}
impl Preset {
    fn name(&self) -> &str {
        let (Preset::Name(name) | Preset::WithOptions(name, _)) = self;
        name
    }
    /// `es2015`, `babel-preset-es2015`, `@babel/preset-env`, `@babel/env`...
    fn lowers_es2015(&self) -> bool {
        let name = self.name();
        let name = name.strip_prefix("@babel/").unwrap_or(name);
        let name = name.strip_prefix("babel-").unwrap_or(name);
        let name = name.strip_prefix("preset-").unwrap_or(name);
        matches!(name, "es2015" | "env")
    }
}

impl Es2015 {
    /// Reads a babel-style config. A malformed `presets` list is an
    /// [`Error::Options`].
    pub fn new(config: serde_json::Value) -> Result<Self> {
        let config: BabelConfig = match config {
            serde_json::Value::Null => BabelConfig::default(),
            config => serde_json::from_value(config)?,
        };
        let run_es2015 = config
            .presets
            .as_ref()
            .is_none_or(|presets| presets.iter().any(Preset::lowers_es2015));
        tracing::debug!(?config, run_es2015, "es2015 lowering configured");
        Ok(Self { run_es2015 })
    }
}
impl Lowering for Es2015 {
    #[tracing::instrument(level = "debug", skip_all, fields(len = body.len(), run_es2015 = self.run_es2015))]
    fn lower(&self, body: &str) -> Result<String, BoxError> {
        let cm: Lrc<SourceMap> = Default::default();
        let (_, script) = parse_script(&cm, "lowered template body", body)?;
        let code = GLOBALS.set(&Globals::new(), || {
            HELPERS.set(&Helpers::new(false), || {
                let unresolved_mark = Mark::new();
                let top_level_mark = Mark::new();
                let mut program = Program::Script(script);
                resolver(unresolved_mark, top_level_mark, false).process(&mut program);
                if self.run_es2015 {
                    swc_ecma_compat_es2015::es2015(
                        unresolved_mark,
                        None::<SingleThreadedComments>,
                        Default::default(),
                    )
                    .process(&mut program);
                    inject_helpers(unresolved_mark).process(&mut program);
                }
                hygiene().process(&mut program);
                fixer(None).process(&mut program);
                swc_ecma_codegen::to_code_default(cm.clone(), None, &program)
            })
        });
        Ok(strip_use_strict(&code).to_owned())
    }
}

/// Drops a leading `"use strict"` directive line some lowerings prepend.
pub fn strip_use_strict(code: &str) -> &str {
    let first = code.lines().next().unwrap_or_default().trim();
    match first {
        "'use strict';" | "\"use strict\";" => code.split_once('\n').map_or("", |(_, rest)| rest),
        _ => code,
    }
}

/// Runs `lowering` over the interior lines of `lines`, keeping the first two
/// and last two untouched, and returns the re-glued line list.
pub(crate) fn lower_interior(lines: &[&str], lowering: &dyn Lowering) -> Result<Vec<String>> {
    let n = lines.len();
    let interior = lines[2..n - 2].join("\n");
    let lowered = lowering.lower(&interior).map_err(Error::Lowering)?;
    let lowered = strip_use_strict(&lowered);
    Ok(lines[..2]
        .iter()
        .map(|l| (*l).to_owned())
        .chain(lowered.trim_end_matches('\n').split('\n').map(str::to_owned))
        .chain(lines[n - 2..].iter().map(|l| (*l).to_owned()))
        .collect())
}
