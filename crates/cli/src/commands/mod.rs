pub mod proxy;
pub mod query;
pub mod server;
