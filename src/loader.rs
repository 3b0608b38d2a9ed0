//! Turns template text into a CommonJS module exporting the compiled,
//! strict-mode-safe template function.
use crate::*;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Options recognised by [`load`], in the shape bundler loaders receive them.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct LoaderOptions {
    /// Delimiter regexes by name (`evaluate`, `interpolate`, `escape`).
    /// Replaces the defaults entirely; delimiters left out are disabled.
    pub template_settings: Option<BTreeMap<String, String>>,
    /// Prepend an HTML comment naming the template resource.
    pub add_filename_comment: bool,
    /// Extra global names. Anything but an array of strings counts as empty.
    pub globals: Value,
    /// Enables ES2015 lowering of template code. A babel-style object whose
    /// `presets` pick whether the ES2015 pass runs; see [`Es2015::new`].
    #[serde(alias = "babel")]
    pub secondary_transform: Option<Value>,
}
impl LoaderOptions {
    /// Parses a loader query: either `?{...}` JSON or `?a=1&b&c[]=x&c[]=y`.
    ///
    /// Bare keys are `true` (`-key` is `false`), the values `true` and
    /// `false` become booleans and `key[]` collects an array.
    pub fn from_query(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        if query.trim_start().starts_with('{') {
            return Ok(serde_json::from_str(query)?);
        }
        let mut map = Map::new();
        for pair in query.split(['&', ',']).filter(|p| !p.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => {
                    let value = percent_decode(value);
                    let value = match value.as_str() {
                        "true" => Value::Bool(true),
                        "false" => Value::Bool(false),
                        _ => Value::String(value),
                    };
                    (percent_decode(key), value)
                }
                None => match pair.strip_prefix('-') {
                    Some(key) => (percent_decode(key), Value::Bool(false)),
                    None => (
                        percent_decode(pair.strip_prefix('+').unwrap_or(pair)),
                        Value::Bool(true),
                    ),
                },
            };
            match key.strip_suffix("[]") {
                Some(key) => {
                    let slot = map
                        .entry(key.to_owned())
                        .or_insert_with(|| Value::Array(vec![]));
                    match slot {
                        Value::Array(items) => items.push(value),
                        other => *other = Value::Array(vec![take(other), value]),
                    }
                }
                None => {
                    map.insert(key, value);
                }
            }
        }
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// The configured global names, skipping anything that is not a string.
    pub fn globals(&self) -> Vec<String> {
        match &self.globals {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| match v.as_str() {
                    Some(s) => Some(s.to_owned()),
                    None => {
                        tracing::debug!(global = %v, "skipping non-string global");
                        None
                    }
                })
                .collect(),
            Value::Null => vec![],
            other => {
                tracing::debug!(globals = %other, "globals is not a list, ignoring it");
                vec![]
            }
        }
    }

    /// Appends `names` to the configured globals.
    pub fn add_globals<I: IntoIterator<Item = String>>(&mut self, names: I) {
        let mut globals = self.globals();
        globals.extend(names);
        self.globals = Value::Array(globals.into_iter().map(Value::String).collect());
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let hex = |b: u8| (b as char).to_digit(16);
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                    (Some(h), Some(l)) => {
                        out.push((h * 16 + l) as u8);
                        i += 3;
                        continue;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Compiles `content` and returns `module.exports = <function>;\n`.
///
/// `resource` names the template in the optional debug comment.
pub fn load(content: &str, resource: &str, options: &LoaderOptions) -> Result<String> {
    let lowering = options
        .secondary_transform
        .clone()
        .map(Es2015::new)
        .transpose()?;
    load_with(
        content,
        resource,
        options,
        lowering.as_ref().map(|l| l as &dyn Lowering),
    )
}

/// Like [`load`], with the caller choosing the lowering step.
#[tracing::instrument(level = "debug", skip(content, options, lowering))]
pub fn load_with(
    content: &str,
    resource: &str,
    options: &LoaderOptions,
    lowering: Option<&dyn Lowering>,
) -> Result<String> {
    let settings = match &options.template_settings {
        Some(patterns) => TemplateSettings::from_patterns(
            patterns.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )?,
        None => TemplateSettings::default(),
    };
    let content = if options.add_filename_comment {
        Cow::Owned(format!("\n<!--  {resource}  -->\n{content}"))
    } else {
        Cow::Borrowed(content)
    };
    let source = template::compile(&content, &settings, CONTEXT)?;
    let source = rewrite(
        &source,
        &RewriteOptions {
            globals: options.globals(),
            lowering,
            ..Default::default()
        },
    )?;
    Ok(format!("module.exports = {source};\n"))
}
