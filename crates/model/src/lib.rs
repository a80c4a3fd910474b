pub mod core {
    pub mod utils;
    pub mod value;
}

pub mod pagination {
    pub mod cursor;
}

pub mod records {
    pub mod chunk;
    pub mod record;
}
