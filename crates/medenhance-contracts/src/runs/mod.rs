pub mod records;
pub mod summary;
