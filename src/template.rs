//! Compiles template text into the function source underscore's
//! `_.template(text, { variable }).source` produces.
use crate::*;
use regex::{Captures, Regex};

/// Never matches; stands in for a disabled delimiter.
const NO_MATCH: &str = "(.)^";

/// Delimiters recognised in template text. Each pattern must have exactly
/// one capture group holding the embedded code.
#[derive(Clone, Debug)]
pub struct TemplateSettings {
    /// `<% code %>`: statements copied into the function.
    pub evaluate: Option<Regex>,
    /// `<%= expr %>`: value appended as is.
    pub interpolate: Option<Regex>,
    /// `<%- expr %>`: value appended through `_.escape`.
    pub escape: Option<Regex>,
}
impl Default for TemplateSettings {
    fn default() -> Self {
        Self::from_patterns(
            [
                ("evaluate", r"<%([\s\S]+?)%>"),
                ("interpolate", r"<%=([\s\S]+?)%>"),
                ("escape", r"<%-([\s\S]+?)%>"),
            ]
            .into_iter(),
        )
        .expect("default delimiters are valid")
    }
}
impl TemplateSettings {
    /// Builds settings from `(name, regex source)` pairs. Delimiters that are
    /// not listed are disabled; unknown names are ignored.
    pub fn from_patterns<'a, I>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self {
            evaluate: None,
            interpolate: None,
            escape: None,
        };
        for (name, pattern) in patterns {
            let slot = match name {
                "evaluate" => &mut settings.evaluate,
                "interpolate" => &mut settings.interpolate,
                "escape" => &mut settings.escape,
                other => {
                    tracing::debug!(name = other, "ignoring unknown template setting");
                    continue;
                }
            };
            *slot = Some(Regex::new(pattern).map_err(|source| Error::Settings {
                name: name.to_owned(),
                source,
            })?);
        }
        Ok(settings)
    }
    fn matcher(&self) -> Result<Regex> {
        let source = |r: &Option<Regex>| r.as_ref().map_or(NO_MATCH, Regex::as_str).to_owned();
        let combined = [
            source(&self.escape),
            source(&self.interpolate),
            source(&self.evaluate),
        ]
        .join("|");
        Regex::new(&combined).map_err(|source| Error::Settings {
            name: "combined".to_owned(),
            source,
        })
    }
}

/// Escapes literal template text for a single-quoted JavaScript string.
fn escape_literal(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
}

/// The code captured by group `i`, when it captured anything.
fn group<'t>(caps: &Captures<'t>, i: usize) -> Option<&'t str> {
    caps.get(i).map(|m| m.as_str()).filter(|s| !s.is_empty())
}

/// Compiles `text` into the source of `function(<variable>){ ... }`.
///
/// The output always has the shape [`rewrite`] expects: signature,
/// accumulator declaration, body, `return __p;`, closing brace.
pub fn compile(text: &str, settings: &TemplateSettings, variable: &str) -> Result<String> {
    let matcher = settings.matcher()?;
    let mut body = String::from("__p+='");
    let mut index = 0;
    for caps in matcher.captures_iter(text) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        escape_literal(&text[index..m.start()], &mut body);
        index = m.end();
        if let Some(escape) = group(&caps, 1) {
            body.push_str(&format!("'+\n((__t=({escape}))==null?'':_.escape(__t))+\n'"));
        } else if let Some(interpolate) = group(&caps, 2) {
            body.push_str(&format!("'+\n((__t=({interpolate}))==null?'':__t)+\n'"));
        } else if let Some(evaluate) = group(&caps, 3) {
            body.push_str(&format!("';\n{evaluate}\n__p+='"));
        }
    }
    escape_literal(&text[index..], &mut body);
    body.push_str("';\n");
    Ok(format!(
        "function({variable}){{\n\
         var __t,__p='',__j=Array.prototype.join,print=function(){{__p+=__j.call(arguments,'');}};\n\
         {body}return __p;\n}}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_default(text: &str) -> String {
        compile(text, &TemplateSettings::default(), CONTEXT).unwrap()
    }

    const HEADER: &str = "function(data){\nvar __t,__p='',__j=Array.prototype.join,print=function(){__p+=__j.call(arguments,'');};\n";

    #[test]
    fn plain_text() {
        assert_eq!(
            compile_default("<div>hello</div>"),
            format!("{HEADER}__p+='<div>hello</div>';\nreturn __p;\n}}")
        );
    }

    #[test]
    fn interpolation() {
        assert_eq!(
            compile_default("<%= foo %>"),
            format!("{HEADER}__p+=''+\n((__t=( foo ))==null?'':__t)+\n'';\nreturn __p;\n}}")
        );
    }

    #[test]
    fn escaping_and_evaluation() {
        assert_eq!(
            compile_default("a<%- b %><% if (c) { %>d<% } %>"),
            format!(
                "{HEADER}__p+='a'+\n((__t=( b ))==null?'':_.escape(__t))+\n'';\n if (c) {{ \n__p+='d';\n }} \n__p+='';\nreturn __p;\n}}"
            )
        );
    }

    #[test]
    fn literal_text_is_escaped() {
        let out = compile_default("it's\\\r\n\u{2028}");
        assert!(out.contains(r"__p+='it\'s\\\r\n\u2028';"), "{out}");
    }

    #[test]
    fn custom_delimiters() {
        let settings = TemplateSettings::from_patterns([
            ("evaluate", r"\{\[([\s\S]+?)\]\}"),
            ("escape", r"\{\{([\s\S]+?)\}\}"),
            ("interpolate", r"\{!([\s\S]+?)!\}"),
        ])
        .unwrap();
        let out = compile("{{ hello }}<%= untouched %>", &settings, CONTEXT).unwrap();
        assert!(out.contains("((__t=( hello ))==null?'':_.escape(__t))"), "{out}");
        assert!(out.contains("<%= untouched %>"), "{out}");
    }

    #[test]
    fn unlisted_delimiters_are_disabled() {
        let settings = TemplateSettings::from_patterns([("interpolate", r"\{\{([\s\S]+?)\}\}")]).unwrap();
        let out = compile("<% x %>{{ y }}", &settings, CONTEXT).unwrap();
        assert!(out.contains("__p+='<% x %>'+"), "{out}");
    }

    #[test]
    fn invalid_delimiters_are_reported() {
        let err = TemplateSettings::from_patterns([("escape", "(")]).unwrap_err();
        assert!(matches!(err, Error::Settings { ref name, .. } if name == "escape"));
    }
}
