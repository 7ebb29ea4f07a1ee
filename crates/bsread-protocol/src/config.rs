/// Sender settings that are independent of the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderConfig {
    /// Pulse ID of the first message.
    pub start_pulse_id: u64,
    /// Compression applied to the serialized data header.
    pub data_header_compression: Option<String>,
    /// Compression for channels registered without their own.
    pub data_compression: Option<String>,
}

impl SenderConfig {
    pub fn with_start_pulse_id(mut self, start_pulse_id: u64) -> Self {
        self.start_pulse_id = start_pulse_id;
        self
    }
}
