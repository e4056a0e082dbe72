//! The raw expression tree the grammar parser produces. Every shape a
//! restricted mapping file may take collapses into this enum; there is
//! nothing here that can express a variable, a function definition, or
//! control flow.

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Num(f64),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// A call to a registered selector constructor, e.g. `Match({...})`.
    Call { name: String, arg: Box<Expr> },
}

impl Expr {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&[(Expr, Expr)]> {
        match self {
            Expr::Dict(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Expr]> {
        match self {
            Expr::Tuple(items) => Some(items),
            _ => None,
        }
    }
}
