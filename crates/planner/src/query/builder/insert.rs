use crate::query::{
    ast::{common::TableRef, expr::Expr, insert::Insert},
    dialect::Dialect,
    renderer::{Render, Renderer},
};
use model::core::value::Value;

#[derive(Debug, Clone)]
pub struct InsertBuilder {
    ast: Insert,
}

impl InsertBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            ast: Insert {
                table,
                columns: Vec::new(),
                values: Vec::new(),
            },
        }
    }

    pub fn columns(mut self, columns: &[String]) -> Self {
        self.ast.columns = columns.to_vec();
        self
    }

    /// Appends one row of bound values.
    pub fn values(mut self, row: Vec<Value>) -> Self {
        self.ast.values.push(row.into_iter().map(Expr::Value).collect());
        self
    }

    /// Appends one row of unbound placeholders, one per column.
    pub fn placeholders(mut self) -> Self {
        let row = vec![Expr::Param; self.ast.columns.len()];
        self.ast.values.push(row);
        self
    }

    pub fn build(self) -> Insert {
        self.ast
    }

    pub fn render(self, dialect: &dyn Dialect) -> (String, Vec<Value>) {
        let mut renderer = Renderer::new(dialect);
        self.ast.render(&mut renderer);
        renderer.finish()
    }
}
