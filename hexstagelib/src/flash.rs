//! The `flash` module commits an assembled image to flash.
//!
//! [`FlashStorage`] is the capability interface to the flash driver, [`MemoryFlash`] a
//! RAM backed NOR model of it, and [`stage`] the writer that fills in the header, erases
//! and programs the destination region and reads it back.

use crate::config::StageConfig;
use crate::error::{FlashError, StageError};
use crate::header::FlashHeader;
use log::{debug, info};
use zerocopy::IntoBytes;

/// Value of an erased flash byte.
pub const ERASED_BYTE: u8 = 0xFF;

/// Interface for reading, erasing and programming flash storage. Drivers report
/// failures instead of leaving them to be discovered by the flashloader.
pub trait FlashStorage {
    /// Fill `buffer` with the contents of flash starting at `offset`
    fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), FlashError>;

    /// Erase `length` bytes starting at `offset`. Both must be sector aligned.
    fn erase(&mut self, offset: usize, length: usize) -> Result<(), FlashError>;

    /// Program `data` at `offset`. Both must be page aligned and the range erased.
    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), FlashError>;

    /// Size of the flash device in bytes
    fn capacity(&self) -> usize;
}

/// In-memory NOR flash: erase sets whole sectors to [`ERASED_BYTE`], programming can
/// only clear bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFlash {
    data: Vec<u8>,
    sector_size: usize,
    page_size: usize,
}

impl MemoryFlash {
    /// Creates a fully erased flash of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize, sector_size: usize, page_size: usize) -> Self {
        Self::from_bytes(vec![ERASED_BYTE; capacity], sector_size, page_size)
    }

    /// Wraps an existing flash dump.
    #[must_use]
    pub const fn from_bytes(data: Vec<u8>, sector_size: usize, page_size: usize) -> Self {
        Self {
            data,
            sector_size,
            page_size,
        }
    }

    /// Raw flash contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn check_range(&self, offset: usize, length: usize) -> Result<(), FlashError> {
        match offset.checked_add(length) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(FlashError::OutOfBounds { offset, length }),
        }
    }

    const fn check_alignment(offset: usize, length: usize, unit: usize) -> Result<(), FlashError> {
        if offset % unit != 0 || length % unit != 0 {
            return Err(FlashError::Misaligned { offset, length });
        }
        Ok(())
    }
}

impl FlashStorage for MemoryFlash {
    fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), FlashError> {
        self.check_range(offset, buffer.len())?;
        buffer.copy_from_slice(&self.data[offset..offset + buffer.len()]);
        Ok(())
    }

    fn erase(&mut self, offset: usize, length: usize) -> Result<(), FlashError> {
        self.check_range(offset, length)?;
        Self::check_alignment(offset, length, self.sector_size)?;
        self.data[offset..offset + length].fill(ERASED_BYTE);
        Ok(())
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<(), FlashError> {
        self.check_range(offset, data.len())?;
        Self::check_alignment(offset, data.len(), self.page_size)?;

        let target = &mut self.data[offset..offset + data.len()];

        // Bits can only go from 1 to 0 - reject before touching anything
        if let Some(pos) = target
            .iter()
            .zip(data)
            .position(|(current, new)| new & !current != 0)
        {
            return Err(FlashError::NotErased(offset + pos));
        }

        for (current, new) in target.iter_mut().zip(data) {
            *current &= new;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// Description of an image committed to flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedImage {
    /// Header as written in front of the payload
    pub header: FlashHeader,
    /// Flash offset of the header
    pub flash_offset: usize,
    /// Absolute address of the header, as handed to the flashloader
    pub header_address: u32,
    /// Header plus payload
    pub total_length: usize,
    /// Bytes erased at `flash_offset` (`total_length` rounded up to a sector)
    pub erase_length: usize,
}

/// Commits the image held in `region` to flash.
///
/// `region` starts with [`FlashHeader::SIZE`] bytes of header space followed by the
/// payload, of which the first `payload_length` bytes are staged. The header is filled in
/// place, the destination is erased (rounded up to whole sectors) and programmed (padded
/// to whole pages with erased bytes) with interrupts disabled, then read back.
///
/// # Errors
/// - [`StageError::ImageEmpty`] if `payload_length` is 0
/// - [`StageError::Overflow`] if `region` does not hold `payload_length` payload bytes
/// - [`StageError::Flash`] if the flash rejects an operation or the read-back differs
pub fn stage<F: FlashStorage>(
    flash: &mut F,
    config: &StageConfig,
    region: &mut [u8],
    payload_length: usize,
) -> Result<StagedImage, StageError> {
    if payload_length == 0 {
        return Err(StageError::ImageEmpty);
    }

    // Calculate length of header plus length of data
    let total_length = FlashHeader::SIZE + payload_length;
    if total_length > region.len() {
        return Err(StageError::Overflow {
            offset: 0,
            length: payload_length,
            capacity: region.len().saturating_sub(FlashHeader::SIZE),
        });
    }

    let erase_length = config.erase_length(total_length);
    let flash_offset = config.flash_image_offset;

    let header = FlashHeader::new(&region[FlashHeader::SIZE..total_length]);
    region[..FlashHeader::SIZE].copy_from_slice(header.as_bytes());
    let image = &region[..total_length];

    info!(
        "Staging {payload_length} byte image (crc32 0x{:08X}) at flash offset 0x{flash_offset:X}",
        header.crc32.get()
    );

    critical_section::with(|_| -> Result<(), FlashError> {
        flash.erase(flash_offset, erase_length)?;
        program_pages(flash, flash_offset, image, config.page_size)
    })?;

    verify(flash, flash_offset, image)?;
    debug!("Verified {total_length} bytes, erased 0x{erase_length:X}");

    Ok(StagedImage {
        header,
        flash_offset,
        header_address: config.header_address(),
        total_length,
        erase_length,
    })
}

/// Program `data` page by page, padding the last page with erased bytes.
fn program_pages<F: FlashStorage>(
    flash: &mut F,
    offset: usize,
    data: &[u8],
    page_size: usize,
) -> Result<(), FlashError> {
    let mut page = vec![ERASED_BYTE; page_size];

    for (i, chunk) in data.chunks(page_size).enumerate() {
        let page_offset = offset + i * page_size;
        if chunk.len() == page_size {
            flash.program(page_offset, chunk)?;
        } else {
            page.fill(ERASED_BYTE);
            page[..chunk.len()].copy_from_slice(chunk);
            flash.program(page_offset, &page)?;
        }
    }
    Ok(())
}

/// Read back `expected.len()` bytes at `offset` and compare.
fn verify<F: FlashStorage>(flash: &F, offset: usize, expected: &[u8]) -> Result<(), FlashError> {
    let mut actual = vec![0; expected.len()];
    flash.read(offset, &mut actual)?;

    match actual.iter().zip(expected).position(|(a, e)| a != e) {
        Some(pos) => Err(FlashError::VerifyMismatch(offset + pos)),
        None => Ok(()),
    }
}
