pub mod sink;
pub mod sqlite;
