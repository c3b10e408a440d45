use rusqlite::Connection;

use crate::db::initialize;

/// An in-memory database with the application tables.
pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open in-memory database");
    initialize(&connection).expect("Could not initialize database");
    connection
}
