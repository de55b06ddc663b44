pub mod field;
pub mod settings;
pub mod transport;
