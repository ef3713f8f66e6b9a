//! The `error` module defines the errors that can occur while receiving and staging
//! a firmware image:
//! 1. [`ParseError`] - a single text line could not be decoded into a hex record.
//! 2. [`FlashError`] - the flash device refused or corrupted an erase/program request.
//! 3. [`StageError`] - the image could not be assembled or committed to flash.
//! 4. [`HeaderError`] - a staged image in flash would be rejected by the flashloader.
//! 5. [`ReceiveError`] - the receive loop stopped before an image was staged.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Line does not contain a ':'
    MissingStartCode,
    /// No hex digit pair follows the ':'
    ContainsInvalidCharacters,
    /// Record holds fewer bytes than the smallest valid one
    RecordTooShort,
    /// Record holds more bytes than the decode buffer can take
    RecordTooLong,
    /// Number of decoded bytes (second) differs from the one implied by the byte count (first)
    RecordInvalidPayloadLength(usize, usize),
    /// Record checksum mismatch
    RecordChecksumMismatch(u8, u8),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStartCode => {
                write!(f, "Missing start code ':'")
            }
            Self::ContainsInvalidCharacters => {
                write!(f, "Record contains invalid character(s)")
            }
            Self::RecordTooShort => {
                write!(f, "Record too short")
            }
            Self::RecordTooLong => {
                write!(f, "Record too long")
            }
            Self::RecordInvalidPayloadLength(expected, actual) => {
                write!(
                    f,
                    "Record length field implies {expected} bytes, decoded {actual}"
                )
            }
            Self::RecordChecksumMismatch(expected, actual) => {
                write!(
                    f,
                    "Invalid record checksum - expected: 0x{expected:02X}, found: 0x{actual:02X}"
                )
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Requested range `[offset, offset + length)` lies outside the device
    OutOfBounds { offset: usize, length: usize },
    /// Range does not start and end on an erase (sector) or program (page) boundary
    Misaligned { offset: usize, length: usize },
    /// Program would need to set bits in a byte that is not erased
    NotErased(usize),
    /// Read-back differs from the programmed data at the given flash offset
    VerifyMismatch(usize),
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { offset, length } => {
                write!(
                    f,
                    "Flash range 0x{offset:X} + 0x{length:X} exceeds the device capacity"
                )
            }
            Self::Misaligned { offset, length } => {
                write!(
                    f,
                    "Flash range 0x{offset:X} + 0x{length:X} is not aligned"
                )
            }
            Self::NotErased(offset) => {
                write!(f, "Flash byte at 0x{offset:X} is not erased")
            }
            Self::VerifyMismatch(offset) => {
                write!(f, "Flash read-back mismatch at 0x{offset:X}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageError {
    /// Data record of `length` bytes at cursor `offset` does not fit into `capacity`
    Overflow {
        offset: usize,
        length: usize,
        capacity: usize,
    },
    /// End-of-file record arrived before any data
    ImageEmpty,
    /// Flash operation failed while committing the image
    Flash(FlashError),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow {
                offset,
                length,
                capacity,
            } => {
                write!(
                    f,
                    "Data record of {length} bytes at offset 0x{offset:04X} overflows the {capacity} byte staging buffer"
                )
            }
            Self::ImageEmpty => {
                write!(f, "End of file received before any data")
            }
            Self::Flash(base_err) => {
                write!(f, "Error encountered while writing the image to flash:\n{base_err}")
            }
        }
    }
}

impl From<FlashError> for StageError {
    fn from(err: FlashError) -> Self {
        Self::Flash(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// Fewer bytes than a header are available
    Truncated,
    /// First or second magic value does not match
    BadMagic(u32, u32),
    /// Declared payload length runs past the end of the available bytes
    LengthOutOfBounds(usize),
    /// Payload checksum mismatch
    CrcMismatch(u32, u32),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => {
                write!(f, "Image header truncated")
            }
            Self::BadMagic(magic1, magic2) => {
                write!(
                    f,
                    "Invalid image header magic: 0x{magic1:08X} 0x{magic2:08X}"
                )
            }
            Self::LengthOutOfBounds(length) => {
                write!(f, "Image length {length} exceeds the available flash")
            }
            Self::CrcMismatch(expected, actual) => {
                write!(
                    f,
                    "Invalid image CRC32 - expected: 0x{expected:08X}, found: 0x{actual:08X}"
                )
            }
        }
    }
}

#[derive(Debug)]
pub enum ReceiveError {
    /// Line source ended before an end-of-file record was received
    InputClosed,
    /// Reading from the line source failed
    Io(std::io::Error),
    /// Transfer was aborted while assembling or staging the image
    Stage(StageError),
}

impl fmt::Display for ReceiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputClosed => {
                write!(f, "Input closed before an end of file record was received")
            }
            Self::Io(base_err) => {
                write!(f, "Serial input failed: {base_err}")
            }
            Self::Stage(base_err) => {
                write!(f, "Transfer aborted:\n{base_err}")
            }
        }
    }
}

impl From<std::io::Error> for ReceiveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<StageError> for ReceiveError {
    fn from(err: StageError) -> Self {
        Self::Stage(err)
    }
}

impl From<FlashError> for ReceiveError {
    fn from(err: FlashError) -> Self {
        Self::Stage(StageError::Flash(err))
    }
}

impl Error for ParseError {}
impl Error for FlashError {}
impl Error for StageError {}
impl Error for HeaderError {}

impl Error for ReceiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InputClosed => None,
            Self::Io(err) => Some(err),
            Self::Stage(err) => Some(err),
        }
    }
}
