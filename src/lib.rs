//! Rewrites compiled underscore-style template functions so that every free
//! variable becomes an explicit property access on the context object.
//!
//! Underscore's `_.template` normally relies on `with (obj) { ... }` to make
//! template variables visible, which strict mode rejects. Compiling with
//! `variable: "data"` removes the `with`, but then every bare reference has
//! to become `data.name`. [`rewrite`] does that, leaving locals, parameters,
//! built-ins and configured globals alone.
use std::{
    collections::{BTreeMap, BTreeSet},
    mem::{replace, take},
};
use swc_common::{FileName, SourceFile, SourceMap, Span, Spanned, input::StringInput, sync::Lrc};
use swc_ecma_ast::{
    ArrowExpr, AssignPatProp, BreakStmt, CatchClause, ClassDecl, ClassExpr, Constructor,
    ContinueStmt, EsVersion, FnDecl, FnExpr, Function, Ident, LabeledStmt, MemberExpr,
    MemberProp, ObjectPatProp, ParamOrTsParamProp, Pat, Prop, PropName, Script, SetterProp,
    VarDecl, VarDeclKind, VarDeclarator,
};
use swc_ecma_parser::{Lexer, Parser, Syntax};
use swc_ecma_visit::{Visit, VisitWith};

pub mod builtins;
pub mod classify;
pub mod error;
pub mod loader;
pub mod lowering;
pub mod scope;
pub mod splice;
pub mod template;
pub mod wither;
#[cfg(any(test, feature = "test"))]
pub mod test;

pub use crate::classify::Reserved;
pub use crate::error::{Error, Result};
pub use crate::loader::{LoaderOptions, load};
pub use crate::lowering::{Es2015, Lowering};
pub use crate::template::TemplateSettings;
pub use crate::wither::{RewriteOptions, rewrite};

/// Name of the context object compiled templates receive.
pub const CONTEXT: &str = "data";

/// Parses `src` as a classic script.
///
/// Recoverable parser errors are treated as fatal: a template body the
/// parser had to patch up would not round-trip through the text splicer.
pub(crate) fn parse_script(
    cm: &Lrc<SourceMap>,
    name: &str,
    src: &str,
) -> Result<(Lrc<SourceFile>, Script)> {
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(name.to_owned())),
        src.to_owned(),
    );
    let lexer = Lexer::new(
        Syntax::Es(Default::default()),
        EsVersion::latest(),
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let offset = |span: Span| span.lo.0.saturating_sub(fm.start_pos.0) as usize;
    let script = parser
        .parse_script()
        .map_err(|e| Error::parse_at(src, offset(e.span()), e.kind().msg()))?;
    if let Some(e) = parser.take_errors().into_iter().next() {
        return Err(Error::parse_at(src, offset(e.span()), e.kind().msg()));
    }
    Ok((fm, script))
}
