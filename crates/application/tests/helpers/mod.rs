mod mock_ports;

pub use mock_ports::{MockBackendRelay, MockMetrics, MockQueryCodec};
