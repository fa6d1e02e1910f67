pub mod udp;

pub use udp::UdpBackendRelay;
