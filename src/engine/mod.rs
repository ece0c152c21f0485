pub mod ingest;
pub mod normalize;
pub mod source;
pub mod summary;
pub mod validate;
