/// How a delimited file maps onto record fields.
#[derive(Debug, Clone)]
pub struct CsvSettings {
    pub field_names: Vec<String>,
    pub delimiter: u8,
    pub has_header: bool,
}

impl CsvSettings {
    pub fn new(field_names: Vec<String>) -> Self {
        Self {
            field_names,
            delimiter: b',',
            has_header: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub(crate) fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .has_headers(self.has_header)
            // Field counts are checked per row so a bad row can be skipped.
            .flexible(true);
        builder
    }
}
