use crate::query::{
    ast::create_table::CreateTable,
    renderer::{Render, Renderer},
};

impl Render for CreateTable {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str("CREATE TABLE ");
        if self.if_not_exists {
            r.sql.push_str("IF NOT EXISTS ");
        }
        r.render_table_ref(&self.table);
        r.sql.push_str(" (");

        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                let mut def = format!(
                    "{} {}",
                    r.dialect.quote_identifier(&col.name),
                    r.dialect.render_data_type(col.data_type)
                );
                if !col.is_nullable {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();

        if !self.primary_key.is_empty() {
            let keys: Vec<String> = self
                .primary_key
                .iter()
                .map(|k| r.dialect.quote_identifier(k))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        r.sql.push_str(&parts.join(", "));
        r.sql.push_str(");");
    }
}
