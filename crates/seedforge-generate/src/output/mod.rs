pub mod csv;

pub use csv::{write_model_csv, write_store_csv};
