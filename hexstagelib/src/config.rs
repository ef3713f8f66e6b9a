//! The `config` module holds [`StageConfig`], the board specific placement of the
//! staged image and the timing of the reboot handoff.

/// Offset within flash of the new app image to be copied by the flashloader.
pub const FLASH_IMAGE_OFFSET: usize = 128 * 1024;
/// Absolute address at which flash offset 0 is mapped (execute-in-place window).
pub const XIP_BASE: u32 = 0x1000_0000;
/// Smallest erasable unit of the flash device.
pub const FLASH_SECTOR_SIZE: usize = 4096;
/// Smallest programmable unit of the flash device.
pub const FLASH_PAGE_SIZE: usize = 256;
/// Delay between requesting the watchdog reset and the reset itself.
pub const REBOOT_DELAY_MS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    /// Flash offset at which the image header is written
    pub flash_image_offset: usize,
    /// Absolute address of flash offset 0
    pub xip_base: u32,
    /// Erase granularity in bytes (power of two)
    pub sector_size: usize,
    /// Program granularity in bytes (power of two)
    pub page_size: usize,
    /// Watchdog delay before the reboot takes effect
    pub reboot_delay_ms: u32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StageConfig {
    /// Creates the default configuration of the reference board.
    ///
    /// # Examples
    /// ```
    /// use hexstagelib::StageConfig;
    ///
    /// let cfg = StageConfig::new();
    /// assert_eq!(cfg.flash_image_offset, 0x2_0000);
    /// assert_eq!(cfg.header_address(), 0x1002_0000);
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flash_image_offset: FLASH_IMAGE_OFFSET,
            xip_base: XIP_BASE,
            sector_size: FLASH_SECTOR_SIZE,
            page_size: FLASH_PAGE_SIZE,
            reboot_delay_ms: REBOOT_DELAY_MS,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    /// Absolute (memory mapped) address of the staged image header, as handed to the
    /// flashloader.
    #[must_use]
    pub const fn header_address(&self) -> u32 {
        self.xip_base.wrapping_add(self.flash_image_offset as u32)
    }

    /// Round `length` up to the next sector boundary.
    ///
    /// # Examples
    /// ```
    /// use hexstagelib::StageConfig;
    ///
    /// let cfg = StageConfig::new();
    /// assert_eq!(cfg.erase_length(17), 4096);
    /// assert_eq!(cfg.erase_length(4096), 4096);
    /// assert_eq!(cfg.erase_length(4112), 8192);
    /// ```
    #[must_use]
    pub const fn erase_length(&self, length: usize) -> usize {
        (length + self.sector_size - 1) & !(self.sector_size - 1)
    }
}
