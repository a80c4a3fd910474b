//! Defines the core rendering trait and context for converting AST to SQL.

use model::core::value::Value;

use crate::query::{
    ast::{
        common::TableRef,
        expr::{Expr, Ident},
    },
    dialect::Dialect,
};

pub mod create_table;
pub mod insert;

/// A trait for any AST node that can be rendered into a SQL string.
pub trait Render {
    fn render(&self, renderer: &mut Renderer);
}

/// A context that holds the state during the rendering process.
///
/// It accumulates the SQL string and the parameters, and provides
/// access to the dialect for syntax-specific details.
pub struct Renderer<'a> {
    pub sql: String,
    pub params: Vec<Value>,
    pub dialect: &'a dyn Dialect,
    slots: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            dialect,
            slots: 0,
        }
    }

    /// Consumes the renderer and returns the final SQL string and parameters.
    pub fn finish(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    pub fn add_param(&mut self, value: Value) {
        self.params.push(value);
        self.add_slot();
    }

    /// Emits the next placeholder without binding a value.
    pub fn add_slot(&mut self) {
        let placeholder = self.dialect.get_placeholder(self.slots);
        self.slots += 1;
        self.sql.push_str(&placeholder);
    }

    pub fn render_table_ref(&mut self, table: &TableRef) {
        if let Some(schema) = &table.schema {
            self.sql.push_str(&self.dialect.quote_identifier(schema));
            self.sql.push('.');
        }
        self.sql.push_str(&self.dialect.quote_identifier(&table.name));
    }
}

impl Render for Expr {
    fn render(&self, r: &mut Renderer) {
        match self {
            Expr::Identifier(Ident { qualifier, name }) => {
                if let Some(q) = qualifier {
                    r.sql.push_str(&r.dialect.quote_identifier(q));
                    r.sql.push('.');
                }
                r.sql.push_str(&r.dialect.quote_identifier(name));
            }
            Expr::Value(value) => r.add_param(value.clone()),
            Expr::Param => r.add_slot(),
            Expr::Literal(sql) => r.sql.push_str(sql),
        }
    }
}
