pub mod dns;
pub mod doq;
pub mod metrics;
