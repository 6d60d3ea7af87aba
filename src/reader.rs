use log::{debug, warn};

use crate::frame::{Command, FrameScanner, Scan};
use crate::response::{Response, TagIter, STATUS_NO_TAG, STATUS_SUCCESS, STATUS_TAG_PRESENT};
use crate::transport::Transport;
use crate::types::{InventoryMode, MemoryBank, ProtocolError, WorkMode};

/// Session over a single reader channel.
///
/// Owns the transport exclusively and issues one blocking request at a time
/// with a configurable read timeout. Concurrent use from multiple threads is
/// a caller error the engine does not defend against.
pub struct Reader<T: Transport> {
    transport: T,
    scanner: FrameScanner,
    read_timeout_ms: u32,
}

impl<T: Transport> Reader<T> {
    // Command opcodes
    const INVENTORY: u8 = 0x01;
    const READ_MEMORY: u8 = 0x02;
    const WRITE_MEMORY: u8 = 0x04;
    const LOCK: u8 = 0x06;
    const SET_POWER: u8 = 0x2F;
    const SET_WORK_MODE: u8 = 0x35;
    const GET_WORK_MODE: u8 = 0x36;

    const DEFAULT_TIMEOUT_MS: u32 = 500;
    const READ_CHUNK: usize = 64;
    const MAX_POWER: u8 = 30;
    const MAX_WRITE_BYTES: usize = 64;

    /// Create a new reader session with the given transport
    pub fn new(transport: T) -> Self {
        Self::with_timeout(transport, Self::DEFAULT_TIMEOUT_MS)
    }

    /// Create a session with a specific per-read timeout in milliseconds
    pub fn with_timeout(transport: T, read_timeout_ms: u32) -> Self {
        Self {
            transport,
            scanner: FrameScanner::new(),
            read_timeout_ms,
        }
    }

    pub fn set_read_timeout(&mut self, read_timeout_ms: u32) {
        self.read_timeout_ms = read_timeout_ms;
    }

    /// Gate inbound frame acceptance on checksum correctness. Off by
    /// default to match observed device behavior; see [`FrameScanner`].
    pub fn set_checksum_verification(&mut self, enabled: bool) {
        self.scanner.set_verify_checksum(enabled);
    }

    /// Close the session and the underlying channel.
    pub fn close(mut self) -> Result<(), ProtocolError> {
        self.transport
            .close()
            .map_err(|e| ProtocolError::Transport(format!("{:?}", e)))
    }

    /// Query the reader's work-mode configuration
    pub fn work_mode(&mut self) -> Result<WorkMode, ProtocolError> {
        let response = self.execute(Command::new(Self::GET_WORK_MODE))?;
        Ok(response.work_mode())
    }

    /// Switch the reader's inventory work mode
    pub fn set_work_mode(&mut self, mode: InventoryMode) -> Result<Response, ProtocolError> {
        self.execute(Command::with_data(Self::SET_WORK_MODE, [mode as u8]))
    }

    /// Set RF output power. `status == 0` on the returned response means the
    /// reader accepted the level.
    pub fn set_power(&mut self, level: u8) -> Result<Response, ProtocolError> {
        if level > Self::MAX_POWER {
            return Err(ProtocolError::InvalidParameter(format!(
                "power level {} out of range 0-{}",
                level,
                Self::MAX_POWER
            )));
        }
        self.execute(Command::with_data(Self::SET_POWER, [level]))
    }

    /// Read `word_count` 2-byte words from a tag's memory bank.
    ///
    /// The EPC selects which tag answers; pass `[0; 4]` as the access
    /// password for unsecured tags.
    pub fn read_memory(
        &mut self,
        epc: &[u8],
        bank: MemoryBank,
        start_address: u8,
        word_count: u8,
        access_password: [u8; 4],
    ) -> Result<Response, ProtocolError> {
        let mut data = Self::epc_prefix(epc)?;
        data.push(bank as u8);
        data.push(start_address);
        data.push(word_count);
        data.extend_from_slice(&access_password);
        self.execute(Command::with_data(Self::READ_MEMORY, data))
    }

    /// Write word-aligned data to a tag's memory bank.
    pub fn write_memory(
        &mut self,
        epc: &[u8],
        bank: MemoryBank,
        start_address: u8,
        words: &[u8],
        access_password: [u8; 4],
    ) -> Result<Response, ProtocolError> {
        if words.is_empty() || words.len() % 2 != 0 {
            return Err(ProtocolError::InvalidParameter(
                "write data must be a non-empty whole number of words".into(),
            ));
        }
        if words.len() > Self::MAX_WRITE_BYTES {
            return Err(ProtocolError::InvalidParameter(format!(
                "write data exceeds maximum of {} bytes",
                Self::MAX_WRITE_BYTES
            )));
        }

        let mut data = Self::epc_prefix(epc)?;
        data.push(bank as u8);
        data.push(start_address);
        data.push((words.len() / 2) as u8);
        data.extend_from_slice(words);
        data.extend_from_slice(&access_password);
        self.execute(Command::with_data(Self::WRITE_MEMORY, data))
    }

    /// Lock or unlock a tag memory area.
    ///
    /// `select` picks the area and `set_protect` the protection state, per
    /// the reader's lock command table.
    pub fn lock(
        &mut self,
        epc: &[u8],
        select: u8,
        set_protect: u8,
        access_password: [u8; 4],
    ) -> Result<Response, ProtocolError> {
        let mut data = Self::epc_prefix(epc)?;
        data.push(select);
        data.push(set_protect);
        data.extend_from_slice(&access_password);
        self.execute(Command::with_data(Self::LOCK, data))
    }

    /// Poll once for tags in Answer Mode.
    ///
    /// Sends one inventory command, reads one response frame and returns a
    /// lazy iterator over its tag payloads. Any recoverable failure (no
    /// frame, undecodable frame) reads as an empty poll; only channel-level
    /// errors are returned. Call repeatedly on a cadence to keep scanning.
    pub fn inventory_answer_mode(&mut self) -> Result<TagIter, ProtocolError> {
        self.inventory(None)
    }

    /// Answer-Mode poll restricted to a TID window of `word_count` words
    /// starting at `start_address`.
    pub fn inventory_answer_mode_tid(
        &mut self,
        start_address: u8,
        word_count: u8,
    ) -> Result<TagIter, ProtocolError> {
        self.inventory(Some([start_address, word_count]))
    }

    /// Consume unsolicited tag reports in Active Mode.
    ///
    /// The device pushes frames without being asked; the returned iterator
    /// never writes to the channel. Read timeouts skip a cycle and
    /// undecodable frames are dropped with a warning, so the iteration only
    /// ends once a fatal channel error has been yielded. Not restartable
    /// mid-frame: reopen the session to start over.
    pub fn inventory_active_mode(&mut self) -> ActiveInventory<'_, T> {
        ActiveInventory {
            reader: self,
            failed: false,
        }
    }

    fn inventory(&mut self, tid_window: Option<[u8; 2]>) -> Result<TagIter, ProtocolError> {
        let command = match tid_window {
            Some(window) => Command::with_data(Self::INVENTORY, window),
            None => Command::new(Self::INVENTORY),
        };
        self.send(&command)?;

        let Some(frame) = self.read_frame()? else {
            return Ok(TagIter::empty());
        };
        match Response::decode(&frame) {
            Ok(response) => {
                match response.status {
                    STATUS_SUCCESS | STATUS_TAG_PRESENT | STATUS_NO_TAG | 0x02..=0x04 => {}
                    status => warn!("inventory status 0x{:02X}", status),
                }
                Ok(response.tags())
            }
            Err(e) => {
                warn!("discarding inventory response: {}", e);
                Ok(TagIter::empty())
            }
        }
    }

    fn send(&mut self, command: &Command) -> Result<(), ProtocolError> {
        // A new exchange starts clean: stale bytes from a previous response
        // must not be mistaken for this command's answer.
        self.scanner.clear();
        let bytes = command.encode();
        debug!("sending command: {:02X?}", bytes);
        self.transport
            .write(&bytes)
            .map_err(|e| ProtocolError::Transport(format!("{:?}", e)))?;
        Ok(())
    }

    fn execute(&mut self, command: Command) -> Result<Response, ProtocolError> {
        self.send(&command)?;
        let frame = self.read_frame()?.ok_or(ProtocolError::NoResponse)?;
        let response = Response::decode(&frame)?;
        debug!("received {}", response);
        Ok(response)
    }

    /// Pull the next structurally valid frame off the channel.
    ///
    /// `Ok(None)` means the read timed out or the scan buffer had to be
    /// resynchronized; both are "nothing this cycle", not failures.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        loop {
            match self.scanner.scan() {
                Scan::Frame { bytes, .. } => return Ok(Some(bytes)),
                Scan::Invalid { .. } => return Ok(None),
                Scan::Incomplete => {}
            }

            let mut chunk = [0u8; Self::READ_CHUNK];
            match self.transport.read(&mut chunk, self.read_timeout_ms) {
                Ok(0) => return Ok(None),
                Ok(n) => self.scanner.extend(&chunk[..n]),
                Err(e) => return Err(ProtocolError::Transport(format!("{:?}", e))),
            }
        }
    }

    fn epc_prefix(epc: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        if epc.len() % 2 != 0 {
            return Err(ProtocolError::InvalidParameter(
                "EPC must be a whole number of words".into(),
            ));
        }
        let mut data = Vec::with_capacity(epc.len() + 12);
        data.push((epc.len() / 2) as u8);
        data.extend_from_slice(epc);
        Ok(data)
    }
}

/// Push-mode iteration over unsolicited device frames.
/// See [`Reader::inventory_active_mode`].
pub struct ActiveInventory<'a, T: Transport> {
    reader: &'a mut Reader<T>,
    failed: bool,
}

impl<T: Transport> Iterator for ActiveInventory<'_, T> {
    type Item = Result<Response, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.reader.read_frame() {
                Ok(Some(frame)) => match Response::decode(&frame) {
                    Ok(response) => return Some(Ok(response)),
                    Err(e) => {
                        warn!("skipping undecodable frame: {}", e);
                        continue;
                    }
                },
                // Timeout or resync: nothing this cycle, keep waiting.
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
