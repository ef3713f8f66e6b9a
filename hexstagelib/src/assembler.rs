//! The `assembler` module reassembles decoded records into a [`StagingBuffer`].
//!
//! Data payloads are appended at the write cursor in arrival order; the record address
//! field is not used for placement. An Extended Linear Address record moves the cursor
//! back to the start of the buffer and the End Of File record completes the image. All
//! other record types are accepted and ignored.

use crate::error::StageError;
use crate::record::{Record, RecordType};
use crate::staging::StagingBuffer;
use log::{debug, info, trace};

/// Granularity of the "block received" progress notices.
pub const BLOCK_SIZE: usize = 1024;

/// Result of feeding one record to the [`ImageAssembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Record consumed, nothing to report
    Continue,
    /// A Data record crossed a [`BLOCK_SIZE`] boundary; holds the new cursor
    BlockReceived(usize),
    /// End of file record; holds the length of the assembled image
    EndOfFile(usize),
}

#[derive(Debug, Clone, Default)]
pub struct ImageAssembler {
    staging: StagingBuffer,
    /// Records consumed since the last reset
    records: usize,
}

impl ImageAssembler {
    /// Creates an assembler with an empty staging buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer(StagingBuffer::new())
    }

    /// Creates an assembler taking ownership of `staging`, which is reset first.
    #[must_use]
    pub fn with_buffer(mut staging: StagingBuffer) -> Self {
        staging.reset();
        Self {
            staging,
            records: 0,
        }
    }

    /// Empties the staging buffer before a new transfer.
    pub fn reset(&mut self) {
        self.staging.reset();
        self.records = 0;
    }

    /// Apply one record to the staging buffer.
    ///
    /// # Errors
    /// Returns [`StageError::Overflow`] if a Data record does not fit between the cursor
    /// and the end of the buffer. Nothing is written in that case.
    ///
    /// # Examples
    /// ```
    /// use hexstagelib::{decode, ImageAssembler, Progress};
    ///
    /// let mut assembler = ImageAssembler::new();
    /// let data = decode(":0300300002337A1E").unwrap();
    /// let eof = decode(":00000001FF").unwrap();
    ///
    /// assert_eq!(assembler.process(&data), Ok(Progress::Continue));
    /// assert_eq!(assembler.process(&eof), Ok(Progress::EndOfFile(3)));
    /// assert_eq!(assembler.image(), &[0x02, 0x33, 0x7A]);
    /// ```
    pub fn process(&mut self, record: &Record) -> Result<Progress, StageError> {
        trace!(
            "Record {:?} at 0x{:04X} with {} bytes",
            record.rtype, record.address, record.length
        );

        let progress = match record.rtype {
            RecordType::Data => {
                let start = self.staging.offset();
                self.staging.write(&record.data)?;

                let end = start + record.data.len();
                if end / BLOCK_SIZE > start / BLOCK_SIZE {
                    info!("Received block ending at 0x{end:05X}");
                    Progress::BlockReceived(self.staging.offset())
                } else {
                    Progress::Continue
                }
            }
            RecordType::EndOfFile => Progress::EndOfFile(self.staging.image_len()),
            RecordType::ExtendedLinearAddress => {
                // Single 64 KiB window - a new segment starts at the beginning of the buffer
                debug!("Extended linear address, rewinding staging buffer");
                self.staging.rewind();
                Progress::Continue
            }
            RecordType::ExtendedSegmentAddress
            | RecordType::StartSegmentAddress
            | RecordType::StartLinearAddress
            | RecordType::Unknown(_) => Progress::Continue,
        };

        self.records += 1;
        Ok(progress)
    }

    /// Number of records consumed since the last reset.
    #[must_use]
    pub const fn records(&self) -> usize {
        self.records
    }

    /// Current write cursor of the staging buffer.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.staging.offset()
    }

    /// Length of the image assembled so far.
    #[must_use]
    pub const fn image_len(&self) -> usize {
        self.staging.image_len()
    }

    /// The image assembled so far.
    #[must_use]
    pub fn image(&self) -> &[u8] {
        self.staging.image()
    }

    #[must_use]
    pub const fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub const fn staging_mut(&mut self) -> &mut StagingBuffer {
        &mut self.staging
    }
}
