//! # `hexstagelib`
//!
//! `hexstagelib` receives an application image as Intel HEX text, reassembles it in RAM
//! and stages it in flash for a first-stage flashloader, which copies it over the running
//! application after a watchdog reset.
//!
//! The library provides:
//! - Record decoding with checksum verification (via [`decode`] and [`Record`]).
//! - Image reassembly into a 64 KiB staging window (via [`ImageAssembler`]).
//! - Staging of header and payload in flash with read-back (via [`stage`]).
//! - The reboot handoff to the flashloader (via [`request_reboot`]).
//! - A complete receive loop tying these together (via [`Receiver`]).
//!
//! ## Example
//!
//! ```
//! use hexstagelib::{LineReader, MemoryFlash, Receiver, ScratchRegisters, StageConfig};
//!
//! let input = b":0300300002337A1E\r\n:00000001FF\r\n";
//! let mut flash = MemoryFlash::new(512 * 1024, 4096, 256);
//! let mut regs = ScratchRegisters::default();
//! let mut status = Vec::new();
//!
//! let mut receiver = Receiver::new(StageConfig::new());
//! let reboot = receiver
//!     .run(&mut LineReader::new(&input[..]), &mut status, &mut flash, &mut regs)
//!     .unwrap();
//!
//! assert_eq!(reboot.image.header.length.get(), 3);
//! assert_eq!(regs.scratch[1], 0x1002_0000);
//! ```

mod assembler;
mod config;
mod crc;
mod error;
mod flash;
mod handoff;
mod header;
mod line;
mod receiver;
mod record;
mod staging;

// Public APIs
pub use assembler::{BLOCK_SIZE, ImageAssembler, Progress};
pub use config::{
    FLASH_IMAGE_OFFSET, FLASH_PAGE_SIZE, FLASH_SECTOR_SIZE, REBOOT_DELAY_MS, StageConfig,
    XIP_BASE,
};
pub use crc::{CRC32_POLY, CRC32_SEED, crc32};
pub use error::{FlashError, HeaderError, ParseError, ReceiveError, StageError};
pub use flash::{ERASED_BYTE, FlashStorage, MemoryFlash, StagedImage, stage};
pub use handoff::{
    HANDOFF_MAGIC, RebootRequested, ResetController, SCRATCH_WORDS, ScratchRegisters,
    request_reboot, staged_header_address,
};
pub use header::{FLASH_MAGIC1, FLASH_MAGIC2, FlashHeader};
pub use line::{LineReader, LineSource, MAX_LINE_LEN};
pub use receiver::{MSG_BLOCK_RECEIVED, MSG_DISCARDING, MSG_STORING, Receiver};
pub use record::{MAX_PAYLOAD, Record, RecordType, decode, encode_image};
pub use staging::{STAGING_CAPACITY, StagingBuffer};
