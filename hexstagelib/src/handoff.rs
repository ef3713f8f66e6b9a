//! The `handoff` module passes a staged image to the flashloader across a watchdog reset.
//!
//! Two scratch words survive the reset: [`HANDOFF_MAGIC`] and the absolute address of the
//! staged header. Requesting the reset is the terminal step of a transfer, modelled by
//! [`RebootRequested`].

use crate::config::StageConfig;
use crate::flash::StagedImage;
use crate::header::FLASH_MAGIC1;
use log::info;

/// Value of the first scratch word telling the flashloader an image is waiting.
pub const HANDOFF_MAGIC: u32 = FLASH_MAGIC1;
/// Number of reset-surviving scratch words.
pub const SCRATCH_WORDS: usize = 8;

/// Watchdog style reset controller with reset-surviving scratch storage.
pub trait ResetController {
    /// Store `value` in scratch word `index`
    fn write_scratch(&mut self, index: usize, value: u32);

    /// Request a reset after `delay_ms` milliseconds
    fn reboot(&mut self, delay_ms: u32);
}

/// Terminal state of a successful transfer: the image is in flash and a reset into the
/// flashloader is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebootRequested {
    /// Handoff words as written to scratch 0 and 1
    pub scratch: [u32; 2],
    pub delay_ms: u32,
    pub image: StagedImage,
}

/// Scratch registers kept in memory, e.g. for simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScratchRegisters {
    pub scratch: [u32; SCRATCH_WORDS],
    /// Delay of the last requested reset
    pub reboot_delay_ms: Option<u32>,
}

impl ResetController for ScratchRegisters {
    fn write_scratch(&mut self, index: usize, value: u32) {
        if let Some(word) = self.scratch.get_mut(index) {
            *word = value;
        }
    }

    fn reboot(&mut self, delay_ms: u32) {
        self.reboot_delay_ms = Some(delay_ms);
    }
}

/// Record the handoff for the flashloader and request the delayed reset.
pub fn request_reboot<C: ResetController>(
    reset: &mut C,
    config: &StageConfig,
    image: StagedImage,
) -> RebootRequested {
    let scratch = [HANDOFF_MAGIC, image.header_address];

    // Set up scratch words so that the flashloader knows what to do after the reset
    for (index, value) in scratch.iter().enumerate() {
        reset.write_scratch(index, *value);
    }
    reset.reboot(config.reboot_delay_ms);

    info!(
        "Reboot into flashloader requested in {} ms (header at 0x{:08X})",
        config.reboot_delay_ms, image.header_address
    );

    RebootRequested {
        scratch,
        delay_ms: config.reboot_delay_ms,
        image,
    }
}

/// Header address left by [`request_reboot`], as the flashloader reads it after the reset.
///
/// # Examples
/// ```
/// use hexstagelib::{staged_header_address, HANDOFF_MAGIC};
///
/// assert_eq!(staged_header_address(&[HANDOFF_MAGIC, 0x1002_0000]), Some(0x1002_0000));
/// assert_eq!(staged_header_address(&[0, 0x1002_0000]), None);
/// ```
#[must_use]
pub fn staged_header_address(scratch: &[u32]) -> Option<u32> {
    match scratch {
        [HANDOFF_MAGIC, address, ..] => Some(*address),
        _ => None,
    }
}
