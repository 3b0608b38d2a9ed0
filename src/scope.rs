//! Names that resolve to something other than the context object.
//!
//! A compiled template body only nests scopes at function and `catch`
//! boundaries, so [`Scopes`] is a plain stack of frames. Resolving walks
//! outwards; `var` and function declarations skip past handler frames to the
//! nearest function frame, everything else lands in the innermost one.

use super::*;

/// What opened a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Function, arrow, class or method body; the root frame is one too.
    Function,
    /// A `catch` handler, owning only its parameter and block-scoped names.
    Handler,
}

#[derive(Clone, Debug)]
struct Frame {
    kind: FrameKind,
    names: BTreeSet<String>,
}

/// Chain of lexical frames, innermost last.
#[derive(Clone, Debug)]
pub struct Scopes {
    frames: Vec<Frame>,
}
impl Scopes {
    /// A chain holding only the root frame, seeded with `names`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            frames: vec![Frame {
                kind: FrameKind::Function,
                names: names.into_iter().map(Into::into).collect(),
            }],
        }
    }
    pub fn enter(&mut self, kind: FrameKind) {
        self.frames.push(Frame {
            kind,
            names: BTreeSet::new(),
        });
    }
    /// Closes the innermost frame. The root frame is never popped.
    pub fn exit(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }
    /// Declares `name` in the innermost frame (`let`, `const`, parameters).
    pub fn declare(&mut self, name: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.names.insert(name.to_owned());
        }
    }
    /// Declares a hoisted `name` (`var`, function declarations) in the
    /// nearest function frame.
    pub fn declare_var(&mut self, name: &str) {
        let frame = self
            .frames
            .iter_mut()
            .rev()
            .find(|f| f.kind == FrameKind::Function);
        if let Some(frame) = frame {
            frame.names.insert(name.to_owned());
        }
    }
    pub fn resolve(&self, name: &str) -> bool {
        self.frames.iter().rev().any(|f| f.names.contains(name))
    }
}

/// Collects the variables a statement list declares at its own level.
///
/// Nested function bodies are skipped, their declarations stay local to them.
#[derive(Default)]
struct DeclCollector {
    names: BTreeSet<String>,
}
impl Visit for DeclCollector {
    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        pat_names(&node.name, &mut self.names);
    }
    fn visit_fn_decl(&mut self, node: &FnDecl) {
        self.names.insert(node.ident.sym.to_string());
    }
    fn visit_function(&mut self, _: &Function) {}
    fn visit_arrow_expr(&mut self, _: &ArrowExpr) {}
}

/// Names declared at the top level of `script`.
///
/// Used on the accumulator line the template compiler emits
/// (`var __t,__p='',__j=...,print=function(){...};`), whose bindings the
/// body relies on but which is never itself rewritten.
pub fn top_level_declarations(script: &Script) -> BTreeSet<String> {
    let mut collector = DeclCollector::default();
    script.visit_with(&mut collector);
    collector.names
}

/// Recursively collects every identifier bound by a pattern.
pub fn pat_names(name: &Pat, x: &mut BTreeSet<String>) {
    match name {
        Pat::Ident(binding_ident) => {
            x.insert(binding_ident.id.sym.to_string());
        }
        Pat::Array(array_pat) => {
            for elem in array_pat.elems.iter().filter_map(|a| a.as_ref()) {
                pat_names(elem, x);
            }
        }
        Pat::Rest(rest_pat) => {
            pat_names(&rest_pat.arg, x);
        }
        Pat::Object(object_pat) => {
            for elem in object_pat.props.iter() {
                match elem {
                    ObjectPatProp::KeyValue(key_value_pat_prop) => {
                        pat_names(&key_value_pat_prop.value, x)
                    }
                    ObjectPatProp::Assign(assign_pat_prop) => {
                        x.insert(assign_pat_prop.key.id.sym.to_string());
                    }
                    ObjectPatProp::Rest(rest_pat) => {
                        pat_names(&rest_pat.arg, x);
                    }
                }
            }
        }
        Pat::Assign(assign_pat) => {
            pat_names(&assign_pat.left, x);
        }
        Pat::Invalid(_) | Pat::Expr(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frames_shadow_and_unwind() {
        let mut scopes = Scopes::new(["Math"]);
        scopes.declare("a");
        scopes.enter(FrameKind::Function);
        scopes.declare("b");
        assert!(scopes.resolve("a") && scopes.resolve("b") && scopes.resolve("Math"));
        scopes.exit();
        assert!(!scopes.resolve("b"));
        assert!(scopes.resolve("a"));
    }

    #[test]
    fn root_frame_survives_extra_exits() {
        let mut scopes = Scopes::new(["x"]);
        scopes.exit();
        scopes.exit();
        assert!(scopes.resolve("x"));
        scopes.declare("y");
        assert!(scopes.resolve("y"));
    }

    #[test]
    fn hoisted_names_outlive_handlers() {
        let mut scopes = Scopes::new(Vec::<String>::new());
        scopes.enter(FrameKind::Handler);
        scopes.declare("e");
        scopes.declare_var("fallback");
        scopes.enter(FrameKind::Handler);
        scopes.declare_var("deeper");
        scopes.exit();
        scopes.exit();
        assert!(!scopes.resolve("e"));
        assert!(scopes.resolve("fallback"));
        assert!(scopes.resolve("deeper"));
    }

    #[test]
    fn hoisting_stops_at_functions() {
        let mut scopes = Scopes::new(Vec::<String>::new());
        scopes.enter(FrameKind::Function);
        scopes.enter(FrameKind::Handler);
        scopes.declare_var("local");
        scopes.exit();
        assert!(scopes.resolve("local"));
        scopes.exit();
        assert!(!scopes.resolve("local"));
    }

    #[test]
    fn accumulator_line_declarations() {
        let cm: Lrc<SourceMap> = Default::default();
        let (_, script) = parse_script(
            &cm,
            "header",
            "var __t,__p='',__j=Array.prototype.join,print=function(){var inner;__p+=__j.call(arguments,'');};",
        )
        .unwrap();
        let names = top_level_declarations(&script);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            ["__j", "__p", "__t", "print"]
        );
    }

    #[test]
    fn destructuring_patterns() {
        let cm: Lrc<SourceMap> = Default::default();
        let (_, script) =
            parse_script(&cm, "pat", "var {a, b: [c, ...d], e = 1, ...f} = x, g = h;").unwrap();
        let names = top_level_declarations(&script);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            ["a", "c", "d", "e", "f", "g"]
        );
    }
}
