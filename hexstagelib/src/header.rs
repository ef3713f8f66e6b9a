//! The `header` module defines [`FlashHeader`], the fixed prefix written in front of the
//! staged payload so that the flashloader can find and validate it.
//!
//! Layout (little-endian): `[magic1: 4][magic2: 4][length: 4][crc32: 4][payload]`.

use crate::crc::{CRC32_SEED, crc32};
use crate::error::HeaderError;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const FLASH_MAGIC1: u32 = 0x8ECD_5EFB;
pub const FLASH_MAGIC2: u32 = 0xC5AE_52A7;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FlashHeader {
    pub magic1: U32,
    pub magic2: U32,
    /// Payload length in bytes
    pub length: U32,
    /// CRC32 of the payload, see [`crate::crc`]
    pub crc32: U32,
}

impl FlashHeader {
    pub const SIZE: usize = size_of::<Self>();

    #[allow(clippy::cast_possible_truncation)]
    /// Builds the header describing `payload`.
    ///
    /// # Examples
    /// ```
    /// use hexstagelib::{FlashHeader, FLASH_MAGIC1};
    ///
    /// let header = FlashHeader::new(b"123456789");
    /// assert_eq!(header.magic1.get(), FLASH_MAGIC1);
    /// assert_eq!(header.length.get(), 9);
    /// assert_eq!(header.crc32.get(), 0x0376_E6E7);
    /// ```
    #[must_use]
    pub fn new(payload: &[u8]) -> Self {
        Self {
            magic1: U32::new(FLASH_MAGIC1),
            magic2: U32::new(FLASH_MAGIC2),
            length: U32::new(payload.len() as u32),
            crc32: U32::new(crc32(payload, CRC32_SEED)),
        }
    }

    /// Reads a header from the start of `bytes`, without validating it.
    ///
    /// # Errors
    /// Returns [`HeaderError::Truncated`] if `bytes` is shorter than a header.
    pub fn read(bytes: &[u8]) -> Result<Self, HeaderError> {
        Self::read_from_prefix(bytes)
            .map(|(header, _)| header)
            .map_err(|_| HeaderError::Truncated)
    }

    /// Validates a staged image the way the flashloader does before copying it: both
    /// magic values must match and the CRC32 must verify against `length` bytes
    /// following the header. Returns the payload on success.
    ///
    /// # Errors
    /// Returns a [`HeaderError`] naming the first check that failed.
    ///
    /// # Examples
    /// ```
    /// use hexstagelib::FlashHeader;
    /// use zerocopy::IntoBytes;
    ///
    /// let payload = [0xDE, 0xAD, 0xBE, 0xEF];
    /// let mut region = FlashHeader::new(&payload).as_bytes().to_vec();
    /// region.extend_from_slice(&payload);
    ///
    /// assert_eq!(FlashHeader::validate(&region), Ok(&payload[..]));
    /// ```
    pub fn validate(region: &[u8]) -> Result<&[u8], HeaderError> {
        let header = Self::read(region)?;

        if header.magic1.get() != FLASH_MAGIC1 || header.magic2.get() != FLASH_MAGIC2 {
            return Err(HeaderError::BadMagic(
                header.magic1.get(),
                header.magic2.get(),
            ));
        }

        let length = header.length.get() as usize;
        let payload = region[Self::SIZE..]
            .get(..length)
            .ok_or(HeaderError::LengthOutOfBounds(length))?;

        let actual = crc32(payload, CRC32_SEED);
        if actual != header.crc32.get() {
            return Err(HeaderError::CrcMismatch(header.crc32.get(), actual));
        }

        Ok(payload)
    }
}
