use crate::query::{
    ast::{
        common::TableRef,
        create_table::{ColumnDef, ColumnType, CreateTable},
    },
    dialect::Dialect,
    renderer::{Render, Renderer},
};

#[derive(Debug, Clone)]
pub struct CreateTableBuilder {
    ast: CreateTable,
}

impl CreateTableBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            ast: CreateTable {
                table,
                if_not_exists: true,
                ..Default::default()
            },
        }
    }

    pub fn column(mut self, name: &str, data_type: ColumnType, is_nullable: bool) -> Self {
        self.ast.columns.push(ColumnDef {
            name: name.to_string(),
            data_type,
            is_nullable,
        });
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.ast.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn build(self) -> CreateTable {
        self.ast
    }

    pub fn render(self, dialect: &dyn Dialect) -> String {
        let mut renderer = Renderer::new(dialect);
        self.ast.render(&mut renderer);
        renderer.finish().0
    }
}
