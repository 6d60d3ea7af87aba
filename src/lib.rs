//! UHF RFID reader driver with support for multiple transport backends.
//!
//! Talks the length-prefixed, CRC-16-checksummed frame protocol used by
//! 18000-6C readers over a serial port or TCP socket, and turns the byte
//! stream into a sequence of detected-tag identifiers. The frame scanner
//! tolerates leading noise and frames split across reads.
//!
//! # Features
//!
//! - `serial` - Serial port transport for desktop using serialport crate
//!
//! TCP transport is always available.
//!
//! # Example
//!
//! ```ignore
//! use uhf_reader::{Reader, SerialTransport};
//!
//! let transport = SerialTransport::new("/dev/ttyUSB0", 57600)?;
//! let mut reader = Reader::new(transport);
//!
//! for tag in reader.inventory_answer_mode()? {
//!     println!("Found tag: {:02X?}", tag);
//! }
//! ```

mod frame;
mod reader;
mod response;
mod transport;
mod types;

mod tcp;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use frame::{checksum, Command, FrameScanner, Scan};
pub use reader::{ActiveInventory, Reader};
pub use response::{Response, TagIter};
pub use tcp::TcpTransport;
pub use transport::Transport;
pub use types::{InventoryMode, MemoryBank, ProtocolError, ProtocolFamily, WorkMode};

#[cfg(feature = "serial")]
pub use serial::SerialTransport;
