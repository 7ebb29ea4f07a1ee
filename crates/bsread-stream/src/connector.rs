use bsread_transport::{ConnType, Connector, Mode, Result, TransportConfig};

use crate::inbound::InboundStream;
use crate::outbound::OutboundStream;

/// Opens an [`OutboundStream`] each time a sender opens.
#[derive(Debug, Clone)]
pub struct StreamConnector {
    config: TransportConfig,
}

impl StreamConnector {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Connector for StreamConnector {
    type Sink = OutboundStream;

    fn open(&mut self) -> Result<OutboundStream> {
        OutboundStream::open(&self.config)
    }
}

/// Connect to a bsread source as a receiver.
pub fn connect(address: &str, mode: Mode, queue_size: usize) -> Result<InboundStream> {
    InboundStream::open(&TransportConfig {
        address: address.to_string(),
        mode,
        conn_type: ConnType::Connect,
        queue_size,
        ..TransportConfig::default()
    })
}
