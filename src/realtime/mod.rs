pub mod connection;
pub mod event;
pub mod hub;
pub mod server;
