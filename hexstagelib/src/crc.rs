//! The `crc` module implements the CRC32 used to protect the staged image.
//!
//! The algorithm processes bytes MSB first with polynomial `0x04C11DB7`, no input or
//! output reflection and no final XOR (catalogued as CRC-32/MPEG-2 when seeded with
//! [`CRC32_SEED`]). The flashloader checks the staged payload with the same convention.

/// Generator polynomial (normal representation).
pub const CRC32_POLY: u32 = 0x04C1_1DB7;
/// Seed used for the staged image.
pub const CRC32_SEED: u32 = 0xFFFF_FFFF;

/// Compute the CRC32 of `data` starting from the accumulator value `crc`.
///
/// As no final XOR is applied, the result of one call can seed the next one:
/// `crc32(b, crc32(a, s)) == crc32(a ++ b, s)`.
///
/// # Examples
/// ```
/// use hexstagelib::{crc32, CRC32_SEED};
///
/// assert_eq!(crc32(b"123456789", CRC32_SEED), 0x0376_E6E7);
/// assert_eq!(crc32(&[], 0x1234_5678), 0x1234_5678);
/// ```
#[must_use]
pub fn crc32(data: &[u8], mut crc: u32) -> u32 {
    for &byte in data {
        crc ^= u32::from(byte) << 24;

        for _ in 0..8 {
            if crc & (1 << 31) != 0 {
                crc = (crc << 1) ^ CRC32_POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
