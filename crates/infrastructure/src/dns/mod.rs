pub mod codec;
pub mod transport;

pub use codec::HickoryQueryCodec;
pub use transport::UdpBackendRelay;
