pub mod memory;
pub mod sink;
pub mod source;

pub mod file {
    pub mod csv {
        pub mod settings;
        pub mod source;
    }
}

pub mod sql {
    pub mod statements;

    pub mod postgres {
        pub mod params;
        pub mod utils;
        pub mod writer;
    }

    pub mod sqlite {
        pub mod params;
        pub mod writer;
    }
}
