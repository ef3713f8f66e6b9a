//! The `record` module defines the [`Record`] and [`RecordType`] which are used for
//! decoding (and generating) Intel HEX records.
//!
//! Decoding is deliberately lenient about framing: anything before the ':' is skipped and
//! decoding stops at the first character pair that is not a hex byte, so trailing
//! whitespace or line terminators are ignored. What it does insist on is that the decoded
//! bytes sum to zero and that their number matches the byte count field.

use crate::error::ParseError;
use std::fmt::Write;

mod sizes {
    /// len + addr (2) + rtype + checksum
    pub const FRAMING_BYTES: usize = 5;
    /// Capacity of the decode buffer: 256 payload bytes plus the framing
    pub const DECODE_CAPACITY: usize = 256 + FRAMING_BYTES;
}

/// Largest payload a single record can carry.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordType {
    Data,
    EndOfFile,
    ExtendedSegmentAddress,
    StartSegmentAddress,
    ExtendedLinearAddress,
    StartLinearAddress,
    /// Any type byte outside of 0x00..=0x05
    Unknown(u8),
}

impl From<u8> for RecordType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Data,
            0x01 => Self::EndOfFile,
            0x02 => Self::ExtendedSegmentAddress,
            0x03 => Self::StartSegmentAddress,
            0x04 => Self::ExtendedLinearAddress,
            0x05 => Self::StartLinearAddress,
            other => Self::Unknown(other),
        }
    }
}

impl From<RecordType> for u8 {
    fn from(rtype: RecordType) -> Self {
        match rtype {
            RecordType::Data => 0x00,
            RecordType::EndOfFile => 0x01,
            RecordType::ExtendedSegmentAddress => 0x02,
            RecordType::StartSegmentAddress => 0x03,
            RecordType::ExtendedLinearAddress => 0x04,
            RecordType::StartLinearAddress => 0x05,
            RecordType::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Byte count field, always equal to `data.len()`
    pub length: u8,
    /// Big-endian 16-bit load offset
    pub address: u16,
    pub rtype: RecordType,
    /// Payload bytes
    pub data: Vec<u8>,
    pub checksum: u8,
}

impl Record {
    /// Build a record from its fields, computing the checksum.
    ///
    /// # Errors
    /// Returns [`ParseError::RecordTooLong`] if `data` holds more than 255 bytes.
    ///
    /// # Examples
    /// ```
    /// use hexstagelib::{Record, RecordType};
    ///
    /// let record = Record::new(0x0030, RecordType::Data, &[0x02, 0x33, 0x7A]).unwrap();
    /// assert_eq!(record.checksum, 0x1E);
    /// assert_eq!(record.to_line(), ":0300300002337A1E");
    /// ```
    pub fn new(address: u16, rtype: RecordType, data: &[u8]) -> Result<Self, ParseError> {
        if data.len() > MAX_PAYLOAD {
            return Err(ParseError::RecordTooLong);
        }
        Ok(Self::from_parts(address, rtype, data))
    }

    #[allow(clippy::cast_possible_truncation)]
    /// Build a record whose `data` is known to hold at most [`MAX_PAYLOAD`] bytes.
    fn from_parts(address: u16, rtype: RecordType, data: &[u8]) -> Self {
        debug_assert!(data.len() <= MAX_PAYLOAD);

        let mut record = Self {
            length: data.len() as u8,
            address,
            rtype,
            data: data.to_vec(),
            checksum: 0,
        };
        record.checksum = Self::calculate_checksum(&record.header_bytes())
            .wrapping_add(Self::calculate_checksum(&record.data));
        record
    }

    /// The end-of-file record `:00000001FF`.
    #[must_use]
    pub const fn end_of_file() -> Self {
        Self {
            length: 0,
            address: 0,
            rtype: RecordType::EndOfFile,
            data: Vec::new(),
            checksum: 0xFF,
        }
    }

    /// Calculate the two's complement checksum of a byte slice.
    #[must_use]
    pub fn calculate_checksum(data: &[u8]) -> u8 {
        let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        (!sum).wrapping_add(1) // two's complement
    }

    fn header_bytes(&self) -> [u8; 4] {
        let [addr_high, addr_low] = self.address.to_be_bytes();
        [self.length, addr_high, addr_low, self.rtype.into()]
    }

    /// Decode a record from one text line.
    ///
    /// Everything before the first ':' is ignored. Hex byte pairs (case-insensitive) are
    /// consumed until the first pair that is not one; their wrapping sum must be zero.
    ///
    /// # Errors
    /// - [`ParseError::MissingStartCode`] if the line holds no ':'
    /// - [`ParseError::ContainsInvalidCharacters`] if no hex byte follows the ':'
    /// - [`ParseError::RecordTooShort`] / [`ParseError::RecordTooLong`] if the number of
    ///   decoded bytes is outside of what a record can hold
    /// - [`ParseError::RecordInvalidPayloadLength`] if the byte count field disagrees with
    ///   the number of decoded bytes
    /// - [`ParseError::RecordChecksumMismatch`] if the bytes do not sum to zero
    pub fn parse(line: &[u8]) -> Result<Self, ParseError> {
        let start = line
            .iter()
            .position(|&c| c == b':')
            .ok_or(ParseError::MissingStartCode)?;

        let mut bytes = [0u8; sizes::DECODE_CAPACITY];
        let mut count = 0;
        let mut sum: u8 = 0;

        for pair in line[start + 1..].chunks_exact(2) {
            let Some(value) = parse_hex_pair(pair) else {
                break;
            };
            if count == bytes.len() {
                return Err(ParseError::RecordTooLong);
            }
            bytes[count] = value;
            count += 1;
            sum = sum.wrapping_add(value);
        }

        if count == 0 {
            return Err(ParseError::ContainsInvalidCharacters);
        }
        if count < sizes::FRAMING_BYTES {
            return Err(ParseError::RecordTooShort);
        }

        let length = bytes[0];
        let expected_count = length as usize + sizes::FRAMING_BYTES;
        if count != expected_count {
            return Err(ParseError::RecordInvalidPayloadLength(expected_count, count));
        }

        let checksum = bytes[count - 1];
        if sum != 0 {
            let expected = Self::calculate_checksum(&bytes[..count - 1]);
            return Err(ParseError::RecordChecksumMismatch(expected, checksum));
        }

        Ok(Self {
            length,
            address: u16::from_be_bytes([bytes[1], bytes[2]]),
            rtype: RecordType::from(bytes[3]),
            data: bytes[4..count - 1].to_vec(),
            checksum,
        })
    }

    /// Render the record as an Intel HEX line (upper case, without line terminator).
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(1 + 2 * (sizes::FRAMING_BYTES + self.data.len()));
        line.push(':');
        for byte in self.header_bytes().iter().chain(&self.data) {
            let _ = write!(line, "{byte:02X}");
        }
        let _ = write!(line, "{:02X}", self.checksum);
        line
    }
}

/// Decode one text line into a [`Record`]. See [`Record::parse`].
///
/// # Errors
/// Returns a [`ParseError`] describing why the line is not a valid record.
///
/// # Examples
/// ```
/// use hexstagelib::{decode, RecordType};
///
/// let record = decode(":0300300002337A1E").unwrap();
/// assert_eq!(record.rtype, RecordType::Data);
/// assert_eq!(record.address, 0x0030);
/// assert_eq!(record.data, vec![0x02, 0x33, 0x7A]);
///
/// assert!(decode(":0300300002337A1F").is_err());
/// ```
pub fn decode(line: &str) -> Result<Record, ParseError> {
    Record::parse(line.as_bytes())
}

#[allow(clippy::cast_possible_truncation)]
/// Encode a binary image into Data records of up to `max_payload` bytes (clamped to
/// `1..=MAX_PAYLOAD`), followed by the end-of-file record. Lines are separated by `\n`.
///
/// Record addresses are the image offset modulo 64 KiB. Only images of at most
/// [`STAGING_CAPACITY`](crate::STAGING_CAPACITY) bytes can be staged; longer images
/// still encode, with repeating addresses, and are rejected by the receiver.
///
/// # Examples
/// ```
/// use hexstagelib::encode_image;
///
/// let text = encode_image(&[0x02, 0x33, 0x7A], 16);
/// assert_eq!(text, ":0300000002337A4E\n:00000001FF\n");
/// ```
#[must_use]
pub fn encode_image(image: &[u8], max_payload: usize) -> String {
    let chunk_size = max_payload.clamp(1, MAX_PAYLOAD);
    let mut text = String::new();

    for (i, chunk) in image.chunks(chunk_size).enumerate() {
        let address = ((i * chunk_size) % 0x1_0000) as u16;
        text.push_str(&Record::from_parts(address, RecordType::Data, chunk).to_line());
        text.push('\n');
    }

    text.push_str(&Record::end_of_file().to_line());
    text.push('\n');
    text
}

/// Convert a single ASCII hex digit (either case) into its value.
const fn parse_hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Convert two ASCII hex digits into a byte.
fn parse_hex_pair(pair: &[u8]) -> Option<u8> {
    match pair {
        [high, low] => Some((parse_hex_nibble(*high)? << 4) | parse_hex_nibble(*low)?),
        _ => None,
    }
}
