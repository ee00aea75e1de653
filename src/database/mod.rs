pub mod connection;
pub mod entities;

pub use connection::{establish_connection, setup_database};
