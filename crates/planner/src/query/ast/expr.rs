use model::core::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(Ident),
    /// A value bound as a query parameter at render time.
    Value(Value),
    /// A placeholder with no value; used for prepared statements.
    Param,
    /// Raw SQL emitted verbatim.
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub qualifier: Option<String>,
    pub name: String,
}
