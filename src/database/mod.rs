// Database module
// SQLite metadata store; vectors live in the separately persisted index

pub mod sqlite;

pub use sqlite::*;
