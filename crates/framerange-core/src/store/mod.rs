pub mod database;
pub mod locks;
pub mod schema;
