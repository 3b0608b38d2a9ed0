//! Structural predicates deciding what an identifier means.
//!
//! Compiled templates are flat: one function body, with nested scopes only at
//! function and `catch` boundaries. Looking at the kind of the immediate
//! parent is therefore enough to tell declarations, parameters, keys and
//! property names apart from the references that need a context prefix.
use regex::Regex;
use std::sync::LazyLock;

/// Role of the parent an identifier hangs off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parent {
    /// Name slot of a variable declarator, possibly inside a destructuring pattern.
    VarDeclarator,
    /// Name of a function declaration, named function expression or class.
    FunctionName,
    /// Parameter list of a function, arrow, method, setter or constructor.
    Params,
    /// Parameter of a `catch` clause.
    CatchClause,
    /// Key of an object-literal property.
    PropKey,
    /// Property half of `a.b`.
    MemberProp,
    /// Shorthand object property, where key and value are the same identifier.
    Shorthand,
    /// Label of a statement, `break` or `continue`.
    Label,
    /// Any other position; the identifier is read or written as a variable.
    Other,
}

/// An identifier-shaped leaf together with its parent's role.
#[derive(Clone, Copy, Debug)]
pub struct Node<'a> {
    pub name: &'a str,
    pub parent: Option<Parent>,
}
impl<'a> Node<'a> {
    pub fn new(name: &'a str, parent: Parent) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }
}

static SCAFFOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(Reserved::UNDERSCORE_PATTERN).expect("scaffold pattern is valid"));

/// Names the template compiler keeps for its own scaffolding.
#[derive(Clone, Debug)]
pub struct Reserved {
    /// Matches internal variables such as `__p` and `__t`.
    pub pattern: Regex,
    /// Handle of the helper library (`_` for underscore).
    pub helper: String,
}
impl Reserved {
    /// Underscore names its scaffolding `__` plus a single word character.
    pub const UNDERSCORE_PATTERN: &'static str = r"__[0-9A-Za-z_]$";

    pub fn new(pattern: &str, helper: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            helper: helper.into(),
        })
    }
    pub fn contains(&self, name: &str) -> bool {
        name == self.helper || self.pattern.is_match(name)
    }
}
impl Default for Reserved {
    fn default() -> Self {
        Self {
            pattern: SCAFFOLD.clone(),
            helper: "_".to_owned(),
        }
    }
}

/// Whether `node` introduces a binding in the scope it appears in.
pub fn is_declaration_site(node: &Node) -> bool {
    matches!(
        node.parent,
        Some(Parent::VarDeclarator | Parent::FunctionName)
    )
}

/// Whether `node` is a parameter, bound only inside its own function or handler.
pub fn is_parameter_site(node: &Node) -> bool {
    matches!(node.parent, Some(Parent::Params | Parent::CatchClause))
}

/// Whether `node` is a free reference that should be read off the context object.
///
/// Callers still have to rule out names that resolve to a binding.
pub fn is_redirect_candidate(node: &Node, reserved: &Reserved) -> bool {
    let Some(parent) = node.parent else {
        return false;
    };
    !node.name.is_empty()
        && !reserved.contains(node.name)
        && matches!(parent, Parent::Other | Parent::Shorthand)
}
