//! The `staging` module provides the [`StagingBuffer`], the RAM region in which the
//! incoming image is assembled before it is committed to flash.
//!
//! The backing storage reserves [`FlashHeader::SIZE`] bytes in front of the payload so
//! that the header can be filled in place and header plus payload programmed as one
//! contiguous region.

use crate::error::StageError;
use crate::header::FlashHeader;

/// Size of the payload window.
pub const STAGING_CAPACITY: usize = 65536;

#[derive(Debug, Clone)]
pub struct StagingBuffer {
    /// Header space followed by the payload window
    region: Box<[u8]>,
    /// Write cursor into the payload window, always `< STAGING_CAPACITY`
    offset: usize,
    /// Set when the last write ended exactly at the end of the window
    filled: bool,
}

impl Default for StagingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StagingBuffer {
    /// Creates an empty (zero filled) staging buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            region: vec![0; FlashHeader::SIZE + STAGING_CAPACITY].into_boxed_slice(),
            offset: 0,
            filled: false,
        }
    }

    /// Zero fills the buffer and moves the cursor back to the start.
    pub fn reset(&mut self) {
        self.region.fill(0);
        self.offset = 0;
        self.filled = false;
    }

    /// Moves the cursor back to the start without touching the contents.
    pub const fn rewind(&mut self) {
        self.offset = 0;
        self.filled = false;
    }

    /// Current write cursor.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Copies `data` to the cursor and advances it, wrapping to 0 when the end of the
    /// window is reached exactly. Empty writes leave the buffer untouched.
    ///
    /// # Errors
    /// Returns [`StageError::Overflow`] (and writes nothing) if `data` does not fit
    /// between the cursor and the end of the window.
    ///
    /// # Examples
    /// ```
    /// use hexstagelib::{StagingBuffer, STAGING_CAPACITY};
    ///
    /// let mut staging = StagingBuffer::new();
    /// staging.write(&[1, 2, 3]).unwrap();
    /// assert_eq!(staging.offset(), 3);
    /// assert_eq!(staging.image(), &[1, 2, 3]);
    ///
    /// assert!(staging.write(&vec![0; STAGING_CAPACITY]).is_err());
    /// assert_eq!(staging.offset(), 3);
    /// ```
    pub fn write(&mut self, data: &[u8]) -> Result<(), StageError> {
        if data.is_empty() {
            return Ok(());
        }

        let end = self.offset + data.len();
        if end > STAGING_CAPACITY {
            return Err(StageError::Overflow {
                offset: self.offset,
                length: data.len(),
                capacity: STAGING_CAPACITY,
            });
        }

        let start = FlashHeader::SIZE + self.offset;
        self.region[start..start + data.len()].copy_from_slice(data);

        self.filled = end == STAGING_CAPACITY;
        self.offset = end % STAGING_CAPACITY;
        Ok(())
    }

    /// Length of the assembled image: the cursor, or the whole window if the last write
    /// filled it up to the end.
    #[must_use]
    pub const fn image_len(&self) -> usize {
        if self.filled {
            STAGING_CAPACITY
        } else {
            self.offset
        }
    }

    /// The assembled image, `image_len()` bytes.
    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.region[FlashHeader::SIZE..FlashHeader::SIZE + self.image_len()]
    }

    /// The whole payload window.
    #[must_use]
    pub fn window(&self) -> &[u8] {
        &self.region[FlashHeader::SIZE..]
    }

    /// Header space followed by the payload window, as handed to the flash writer.
    pub fn flash_region_mut(&mut self) -> &mut [u8] {
        &mut self.region
    }
}
