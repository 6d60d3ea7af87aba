//! Inbound frame decoding: response structure and inventory payloads.

use std::fmt;

use crate::types::{bytes_to_hex, ProtocolError, WorkMode};

pub(crate) const STATUS_SUCCESS: u8 = 0x00;
pub(crate) const STATUS_TAG_PRESENT: u8 = 0x01;
pub(crate) const STATUS_NO_TAG: u8 = 0xFB;

/// Cap on structured tag entries under the tag-present status. Short,
/// irregular frames are seen in practice; an absurd count byte must not
/// drive an unbounded walk.
const TAG_PRESENT_ENTRY_CAP: u8 = 10;

/// Decoded response frame.
#[derive(Debug, Clone)]
pub struct Response {
    pub reader_address: u8,
    pub command: u8,
    pub status: u8,
    pub data: Vec<u8>,
    pub checksum: u16,
}

impl Response {
    /// Decode a frame produced by the scanner.
    ///
    /// The length byte of a response counts every byte of the frame,
    /// including itself and the trailing checksum. The payload spans bytes
    /// 4 through `length - 2`; frames of 6 or fewer bytes carry none.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < 6 {
            return Err(ProtocolError::MalformedResponse(format!(
                "frame too short to be a response: {} bytes",
                frame.len()
            )));
        }
        let length = frame[0] as usize;
        if length < 6 {
            return Err(ProtocolError::MalformedResponse(format!(
                "declared length {} below response minimum",
                length
            )));
        }
        if frame.len() < length {
            return Err(ProtocolError::MalformedResponse(format!(
                "declared length {} exceeds {} available bytes",
                length,
                frame.len()
            )));
        }
        let data = if length > 6 {
            frame[4..length - 2].to_vec()
        } else {
            Vec::new()
        };
        let checksum = u16::from_le_bytes([frame[length - 2], frame[length - 1]]);
        Ok(Self {
            reader_address: frame[1],
            command: frame[2],
            status: frame[3],
            data,
            checksum,
        })
    }

    /// Iterate the tag payloads of an inventory-class response.
    ///
    /// Which walk is used depends on the status byte; see [`TagIter`].
    pub fn tags(&self) -> TagIter {
        TagIter::from_response(self.status, self.data.clone())
    }

    /// Decode the payload of a work-mode query response.
    pub fn work_mode(&self) -> WorkMode {
        WorkMode::from_payload(&self.data)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cmd 0x{:02X} status 0x{:02X} data {}",
            self.command,
            self.status,
            bytes_to_hex(&self.data)
        )
    }
}

/// Lazy iterator over the `(count, (length, bytes)*)` tag entries of an
/// inventory payload.
///
/// Under the success status, an entry whose declared length would run past
/// the payload boundary ends the iteration. Under the tag-present status the
/// same structure is attempted first, but an inconsistent entry makes the
/// iterator yield the remaining payload as one raw tag, matching the short
/// frame shapes some readers emit.
#[derive(Debug)]
pub struct TagIter {
    data: Vec<u8>,
    pos: usize,
    remaining: u8,
    fallback: bool,
    done: bool,
}

impl TagIter {
    pub(crate) fn empty() -> Self {
        Self {
            data: Vec::new(),
            pos: 0,
            remaining: 0,
            fallback: false,
            done: true,
        }
    }

    fn from_response(status: u8, data: Vec<u8>) -> Self {
        match status {
            STATUS_SUCCESS if !data.is_empty() => Self {
                remaining: data[0],
                data,
                pos: 1,
                fallback: false,
                done: false,
            },
            STATUS_TAG_PRESENT if data.len() >= 2 => Self {
                remaining: data[0].min(TAG_PRESENT_ENTRY_CAP),
                data,
                pos: 1,
                fallback: true,
                done: false,
            },
            // 0xFB means no tags in field; any other status yields nothing.
            _ => Self::empty(),
        }
    }
}

impl Iterator for TagIter {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.done {
            return None;
        }

        // Tag-present frames with a zero count byte still carry one raw tag.
        // `pos == 1` distinguishes that case from an exhausted count.
        if self.fallback && self.remaining == 0 && self.pos == 1 {
            self.done = true;
            if self.data.len() > 1 {
                return Some(self.data[1..].to_vec());
            }
            return None;
        }

        while self.remaining > 0 {
            self.remaining -= 1;
            if self.pos >= self.data.len() {
                break;
            }
            let tag_length = self.data[self.pos] as usize;
            let start = self.pos + 1;
            let end = start + tag_length;
            if end <= self.data.len() && (!self.fallback || tag_length > 0) {
                self.pos = end;
                return Some(self.data[start..end].to_vec());
            }
            if self.fallback {
                // Entry inconsistent with the remaining payload: hand the
                // rest over as a single raw tag.
                self.done = true;
                if self.data.len() - self.pos >= 2 {
                    return Some(self.data[self.pos..].to_vec());
                }
                return None;
            }
            break;
        }

        self.done = true;
        None
    }
}
