use std::time::Instant;

/// A raw device signal, already framed by the transport but not yet
/// interpreted. `address` and `value` mean whatever the interface's
/// translator says they mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignal {
    pub address: u32,
    pub value: i32,
    pub received_at: Instant,
}

impl RawSignal {
    pub fn new(address: u32, value: i32) -> Self {
        Self::at(address, value, Instant::now())
    }

    pub fn at(address: u32, value: i32, received_at: Instant) -> Self {
        Self {
            address,
            value,
            received_at,
        }
    }
}
