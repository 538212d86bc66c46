pub mod aliases;
pub mod catalog;
pub mod protocol;
pub mod server;
