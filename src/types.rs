//! Types shared across the protocol engine

use thiserror::Error;

/// Errors that can occur during reader operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Transport layer error (serial, TCP, etc.); the session is no longer usable
    #[error("transport error: {0}")]
    Transport(String),
    /// The reader produced no frame within the read timeout
    #[error("no response from reader")]
    NoResponse,
    /// Invalid parameter passed to a function
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Frame was found on the wire but its contents could not be decoded
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Inventory acquisition mode the reader is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InventoryMode {
    /// Tags are returned only in response to an explicit inventory command
    Answer = 0x00,
    /// Tag detections are pushed unsolicited, without a request
    Active = 0x01,
    TriggerLow = 0x02,
    TriggerHigh = 0x03,
}

impl TryFrom<u8> for InventoryMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(InventoryMode::Answer),
            0x01 => Ok(InventoryMode::Active),
            0x02 => Ok(InventoryMode::TriggerLow),
            0x03 => Ok(InventoryMode::TriggerHigh),
            other => Err(other),
        }
    }
}

/// Air-interface protocol family the reader is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFamily {
    Iso18000_6c,
    Iso18000_6b,
}

/// Tag memory banks addressable by read/write/lock commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoryBank {
    Password = 0x00,
    Epc = 0x01,
    Tid = 0x02,
    User = 0x03,
}

/// Snapshot of the reader's work-mode configuration, decoded from the
/// payload of a work-mode query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkMode {
    /// `None` when the payload is too short or carries an unknown mode byte
    pub inventory_mode: Option<InventoryMode>,
    pub protocol: Option<ProtocolFamily>,
    pub buzzer: bool,
}

impl WorkMode {
    const MODE_OFFSET: usize = 4;
    const BUZZER_OFFSET: usize = 6;

    /// Decode from a work-mode response payload. Payloads shorter than an
    /// offset decode that field as unknown rather than panicking.
    pub fn from_payload(data: &[u8]) -> Self {
        Self {
            inventory_mode: data
                .get(Self::MODE_OFFSET)
                .and_then(|&b| InventoryMode::try_from(b).ok()),
            protocol: data.first().map(|&b| {
                if b & 0x01 == 0 {
                    ProtocolFamily::Iso18000_6c
                } else {
                    ProtocolFamily::Iso18000_6b
                }
            }),
            buzzer: data.get(Self::BUZZER_OFFSET).is_some_and(|&b| b != 0),
        }
    }
}

/// Convert bytes to uppercase hex string
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
