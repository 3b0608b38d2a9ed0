use crate::*;

/// Accumulator line emitted by the template compiler.
pub const ACCUMULATOR: &str =
    "var __t,__p='',__j=Array.prototype.join,print=function(){__p+=__j.call(arguments,'');};";

/// Wraps a hand-written body in the compiled-template scaffolding.
pub fn compiled(body: &str) -> String {
    format!("function({CONTEXT}){{\n{ACCUMULATOR}\n{body}\nreturn __p;\n}}")
}

/// Compiles template text with the default delimiters.
pub fn compile(template: &str) -> String {
    template::compile(template, &TemplateSettings::default(), CONTEXT)
        .expect("failed to compile template")
}

/// Compiles and rewrites template text with default options.
pub fn rewrite_template(template: &str) -> String {
    rewrite(&compile(template), &RewriteOptions::default()).expect("failed to rewrite template")
}

#[macro_export]
macro_rules! rewrite_test {
    ($name:ident [$template:expr] => |$out:pat_param| $e:expr) => {
        #[test]
        fn $name() {
            match $crate::test::rewrite_template($template) {
                $out => $e,
            }
        }
    };
}
