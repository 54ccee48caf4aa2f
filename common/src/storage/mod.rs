pub mod entity_store;
pub mod store;
pub mod types;
