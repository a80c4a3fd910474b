#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: &str) -> Self {
        TableRef {
            schema: None,
            name: name.to_string(),
        }
    }
}
