//! Removes the need for `with` from compiled template functions.
//!
//! Underscore's compiled templates look up their variables through
//! `with (obj) { ... }` unless compiled with a named `variable`. This module
//! takes the second form and rewrites every free reference in the body into
//! an explicit access on that variable:
//! ```javascript
//! function(data){
//! var __t,__p='',__j=Array.prototype.join,print=function(){__p+=__j.call(arguments,'');};
//! __p+=''+
//! ((__t=( foo.bar ))==null?'':__t)+
//! '';
//! return __p;
//! }
//! ```
//! Into the same text with `foo.bar` replaced by `data.foo.bar`. The header
//! and trailer lines are copied through byte for byte; the body keeps its
//! line structure because rewrites are spliced into the original text
//! instead of re-printing the tree.
use crate::classify::{self, Node, Parent, Reserved};
use crate::scope::{FrameKind, Scopes, top_level_declarations};
use crate::splice::{Directive, Splices};
use crate::*;
use std::ops::Range;

/// Opening line standing in for the two header lines while parsing. Its own
/// `{` is closed by the template's trailing `}`.
const WRAPPER: &str = "var __z=function() {\n";

/// Configuration for [`rewrite`].
pub struct RewriteOptions<'a> {
    /// Extra names that resolve outside the template and are never prefixed.
    pub globals: Vec<String>,
    /// Transform applied to the body before identifiers are rewritten.
    /// Parse errors then report lines of the lowered text.
    pub lowering: Option<&'a dyn Lowering>,
    /// Scaffolding names of the template compiler.
    pub reserved: Reserved,
    /// Name of the context object; [`CONTEXT`] unless the compiler was told otherwise.
    pub context: String,
}
impl Default for RewriteOptions<'_> {
    fn default() -> Self {
        Self {
            globals: vec![],
            lowering: None,
            reserved: Reserved::default(),
            context: CONTEXT.to_owned(),
        }
    }
}

/// Walks a parsed template body, tracking bindings and recording a
/// [`Directive`] for every free reference.
struct Wither<'a> {
    /// Text the tree was parsed from.
    source: &'a str,
    /// Position of `source`'s first byte in the source map.
    base: u32,
    scopes: Scopes,
    reserved: &'a Reserved,
    context: &'a str,
    /// Inside a `let`/`const` declaration list.
    lexical: bool,
    directives: Vec<Directive>,
}
impl<'a> Wither<'a> {
    fn range(&self, span: Span) -> Option<Range<usize>> {
        if span.is_dummy() {
            return None;
        }
        let lo = span.lo.0.checked_sub(self.base)? as usize;
        let hi = span.hi.0.checked_sub(self.base)? as usize;
        Some(lo..hi)
    }
    fn site(&mut self, name: &str, span: Span, parent: Parent) {
        let node = Node::new(name, parent);
        if classify::is_declaration_site(&node) {
            match parent {
                Parent::VarDeclarator if self.lexical => self.scopes.declare(name),
                _ => self.scopes.declare_var(name),
            }
            return;
        }
        if classify::is_parameter_site(&node) {
            self.scopes.declare(name);
            return;
        }
        if self.scopes.resolve(name)
            || builtins::is_builtin(name)
            || !classify::is_redirect_candidate(&node, self.reserved)
        {
            return;
        }
        let Some(range) = self.range(span) else {
            return;
        };
        let source = self.source;
        let Some(text) = source.get(range.clone()) else {
            return;
        };
        let replacement = match parent {
            Parent::Shorthand => format!("{text}: {}.{text}", self.context),
            _ => format!("{}.{text}", self.context),
        };
        tracing::trace!(name, ?range, "redirecting to context");
        self.directives.push(Directive { range, replacement });
    }
    /// Declares every name a binding pattern introduces. Default values and
    /// computed keys inside the pattern are ordinary expressions.
    fn bind(&mut self, pat: &Pat, parent: Parent) {
        match pat {
            Pat::Ident(b) => self.site(&b.id.sym, b.id.span, parent),
            Pat::Array(a) => {
                for elem in a.elems.iter().flatten() {
                    self.bind(elem, parent);
                }
            }
            Pat::Rest(r) => self.bind(&r.arg, parent),
            Pat::Object(o) => {
                for prop in o.props.iter() {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => {
                            kv.key.visit_with(self);
                            self.bind(&kv.value, parent);
                        }
                        ObjectPatProp::Assign(a) => {
                            self.site(&a.key.id.sym, a.key.id.span, parent);
                            a.value.visit_with(self);
                        }
                        ObjectPatProp::Rest(r) => self.bind(&r.arg, parent),
                    }
                }
            }
            Pat::Assign(a) => {
                self.bind(&a.left, parent);
                a.right.visit_with(self);
            }
            Pat::Expr(e) => e.visit_with(self),
            Pat::Invalid(_) => {}
        }
    }
    fn scoped(&mut self, kind: FrameKind, f: impl FnOnce(&mut Self)) {
        self.scopes.enter(kind);
        f(self);
        self.scopes.exit();
    }
}
impl Visit for Wither<'_> {
    fn visit_var_decl(&mut self, node: &VarDecl) {
        let outer = replace(&mut self.lexical, node.kind != VarDeclKind::Var);
        node.decls.visit_with(self);
        self.lexical = outer;
    }
    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        self.bind(&node.name, Parent::VarDeclarator);
        node.init.visit_with(self);
    }
    fn visit_fn_decl(&mut self, node: &FnDecl) {
        self.site(&node.ident.sym, node.ident.span, Parent::FunctionName);
        node.function.visit_with(self);
    }
    fn visit_fn_expr(&mut self, node: &FnExpr) {
        self.scoped(FrameKind::Function, |this| {
            if let Some(i) = &node.ident {
                this.site(&i.sym, i.span, Parent::FunctionName);
            }
            node.function.visit_with(this);
        });
    }
    fn visit_function(&mut self, node: &Function) {
        node.decorators.visit_with(self);
        self.scoped(FrameKind::Function, |this| {
            for p in node.params.iter() {
                p.decorators.visit_with(this);
                this.bind(&p.pat, Parent::Params);
            }
            node.body.visit_with(this);
        });
    }
    fn visit_arrow_expr(&mut self, node: &ArrowExpr) {
        self.scoped(FrameKind::Function, |this| {
            for p in node.params.iter() {
                this.bind(p, Parent::Params);
            }
            node.body.visit_with(this);
        });
    }
    fn visit_constructor(&mut self, node: &Constructor) {
        node.key.visit_with(self);
        self.scoped(FrameKind::Function, |this| {
            for p in node.params.iter() {
                if let ParamOrTsParamProp::Param(p) = p {
                    p.decorators.visit_with(this);
                    this.bind(&p.pat, Parent::Params);
                }
            }
            node.body.visit_with(this);
        });
    }
    fn visit_setter_prop(&mut self, node: &SetterProp) {
        node.key.visit_with(self);
        self.scoped(FrameKind::Function, |this| {
            this.bind(&node.param, Parent::Params);
            node.body.visit_with(this);
        });
    }
    fn visit_catch_clause(&mut self, node: &CatchClause) {
        self.scoped(FrameKind::Handler, |this| {
            if let Some(p) = &node.param {
                this.bind(p, Parent::CatchClause);
            }
            node.body.visit_with(this);
        });
    }
    fn visit_class_decl(&mut self, node: &ClassDecl) {
        self.site(&node.ident.sym, node.ident.span, Parent::FunctionName);
        node.class.visit_with(self);
    }
    fn visit_class_expr(&mut self, node: &ClassExpr) {
        self.scoped(FrameKind::Function, |this| {
            if let Some(i) = &node.ident {
                this.site(&i.sym, i.span, Parent::FunctionName);
            }
            node.class.visit_with(this);
        });
    }
    fn visit_labeled_stmt(&mut self, node: &LabeledStmt) {
        self.site(&node.label.sym, node.label.span, Parent::Label);
        node.body.visit_with(self);
    }
    fn visit_break_stmt(&mut self, node: &BreakStmt) {
        if let Some(l) = &node.label {
            self.site(&l.sym, l.span, Parent::Label);
        }
    }
    fn visit_continue_stmt(&mut self, node: &ContinueStmt) {
        if let Some(l) = &node.label {
            self.site(&l.sym, l.span, Parent::Label);
        }
    }
    fn visit_member_expr(&mut self, node: &MemberExpr) {
        node.obj.visit_with(self);
        match &node.prop {
            MemberProp::Ident(p) => self.site(&p.sym, p.span, Parent::MemberProp),
            MemberProp::Computed(c) => c.visit_with(self),
            MemberProp::PrivateName(_) => {}
        }
    }
    fn visit_prop_name(&mut self, node: &PropName) {
        match node {
            PropName::Ident(i) => self.site(&i.sym, i.span, Parent::PropKey),
            PropName::Computed(c) => c.visit_with(self),
            _ => {}
        }
    }
    fn visit_prop(&mut self, node: &Prop) {
        match node {
            Prop::Shorthand(i) => self.site(&i.sym, i.span, Parent::Shorthand),
            _ => node.visit_children_with(self),
        }
    }
    fn visit_assign_pat_prop(&mut self, node: &AssignPatProp) {
        // only reached for assignment patterns; declarations go through `bind`
        self.site(&node.key.id.sym, node.key.id.span, Parent::Shorthand);
        node.value.visit_with(self);
    }
    fn visit_ident(&mut self, node: &Ident) {
        self.site(&node.sym, node.span, Parent::Other);
    }
}

/// Names the accumulator line declares (`__t`, `__p`, `__j`, `print`).
fn header_bindings(line: &str) -> BTreeSet<String> {
    let cm: Lrc<SourceMap> = Default::default();
    match parse_script(&cm, "template header", line) {
        Ok((_, script)) => top_level_declarations(&script),
        Err(e) => {
            tracing::debug!(error = %e, "accumulator line is not a statement, ignoring it");
            BTreeSet::new()
        }
    }
}

/// Prefixes every free variable in the compiled template `source` with the
/// context object.
///
/// The first two lines (signature and accumulator declaration) and the last
/// two (accumulator return and closing brace) are returned unchanged.
///
/// [`Error::Parse`] lines count from the top of `source`, or of the lowered
/// text when [`RewriteOptions::lowering`] is set.
#[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
pub fn rewrite(source: &str, options: &RewriteOptions) -> Result<String> {
    let original: Vec<&str> = source.split('\n').collect();
    if original.len() < 4 {
        return Err(Error::Parse {
            line: original.len(),
            message: "expected a signature line, an accumulator line and a closing return".into(),
        });
    }
    let lowered = match options.lowering {
        Some(l) => Some(lowering::lower_interior(&original, l)?),
        None => None,
    };
    let lines: Vec<&str> = match &lowered {
        Some(l) => l.iter().map(String::as_str).collect(),
        None => original,
    };
    let n = lines.len();
    let (header, rest) = lines.split_at(2);
    let (interior, trailer) = rest.split_at(n - 4);
    let body = interior.join("\n");

    let mut wrapped = String::with_capacity(WRAPPER.len() + source.len());
    wrapped.push_str(WRAPPER);
    let body_start = wrapped.len();
    wrapped.push_str(&body);
    let body_end = wrapped.len();
    if !interior.is_empty() {
        wrapped.push('\n');
    }
    wrapped.push_str(&trailer.join("\n"));

    let cm: Lrc<SourceMap> = Default::default();
    // wrapped line 1 stands in for source lines 1 and 2
    let (fm, script) =
        parse_script(&cm, "template body", &wrapped).map_err(|e| e.shift_line(1))?;

    let scopes = Scopes::new(
        options
            .globals
            .iter()
            .cloned()
            .chain([options.context.clone()])
            .chain(header_bindings(header[1])),
    );
    let mut wither = Wither {
        source: &wrapped,
        base: fm.start_pos.0,
        scopes,
        reserved: &options.reserved,
        context: &options.context,
        lexical: false,
        directives: vec![],
    };
    script.visit_with(&mut wither);

    let splices = Splices::new(
        take(&mut wither.directives)
            .into_iter()
            .filter(|d| d.range.start >= body_start && d.range.end <= body_end)
            .map(|d| Directive {
                range: d.range.start - body_start..d.range.end - body_start,
                replacement: d.replacement,
            })
            .collect(),
    );
    tracing::debug!(rewrites = splices.len(), "rewrote free references");
    let body = if splices.is_empty() {
        body
    } else {
        splices.apply(&body)
    };

    let mut out: Vec<&str> = header.to_vec();
    if !interior.is_empty() {
        out.push(&body);
    }
    out.extend_from_slice(trailer);
    Ok(out.join("\n"))
}
