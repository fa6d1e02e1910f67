#![allow(dead_code)]

mod dns_server_mock;
mod doq_harness;

pub use dns_server_mock::{MockDnsServer, MockMode};
pub use doq_harness::{
    client_settings, open_unfinished_stream, query_with_keepalive, test_identity, FlakyRelay,
    TestServer,
};
