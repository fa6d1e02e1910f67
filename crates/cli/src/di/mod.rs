mod doq;

pub use doq::{build_relay_use_case, client_settings, server_settings};
