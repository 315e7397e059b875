pub mod assert;
pub mod devices;
