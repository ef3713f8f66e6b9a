//! The `receiver` module runs a complete transfer: lines are decoded and assembled until
//! the end of file record, then the image is staged in flash and a reboot into the
//! flashloader is requested.
//!
//! Malformed lines are dropped without any feedback to the sender. Status text written
//! to the serial output is informational only.

use crate::assembler::{ImageAssembler, Progress};
use crate::config::StageConfig;
use crate::error::{ReceiveError, StageError};
use crate::flash::{FlashStorage, stage};
use crate::handoff::{RebootRequested, ResetController, request_reboot};
use crate::line::LineSource;
use crate::record::{Record, RecordType};
use log::{debug, info, warn};
use std::io::Write;

pub const MSG_BLOCK_RECEIVED: &str = "Received block\r\n";
pub const MSG_STORING: &str = "Storing new image in flash and then rebooting\r\n";
pub const MSG_DISCARDING: &str = "Image too large, discarding transfer\r\n";

#[derive(Debug, Clone, Default)]
pub struct Receiver {
    config: StageConfig,
    assembler: ImageAssembler,
    /// Lines dropped because they did not decode
    dropped: usize,
}

impl Receiver {
    #[must_use]
    pub fn new(config: StageConfig) -> Self {
        Self {
            config,
            assembler: ImageAssembler::new(),
            dropped: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &StageConfig {
        &self.config
    }

    #[must_use]
    pub const fn assembler(&self) -> &ImageAssembler {
        &self.assembler
    }

    /// Number of lines dropped during the last run.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Receive one image from `lines` and stage it.
    ///
    /// The staging buffer is reset first. A transfer whose data does not fit into the
    /// staging buffer is discarded up to its end of file record, after which the receiver
    /// waits for a new transfer. An end of file record without any data is ignored rather
    /// than staged as a zero length image.
    ///
    /// Status text is best effort. Failed writes are logged and the transfer continues.
    ///
    /// # Errors
    /// - [`ReceiveError::InputClosed`] if `lines` ends before an image was staged
    /// - [`ReceiveError::Io`] if reading lines fails
    /// - [`ReceiveError::Stage`] if the image could not be committed to flash
    pub fn run<L, W, F, C>(
        &mut self,
        lines: &mut L,
        status: &mut W,
        flash: &mut F,
        reset: &mut C,
    ) -> Result<RebootRequested, ReceiveError>
    where
        L: LineSource,
        W: Write,
        F: FlashStorage,
        C: ResetController,
    {
        self.assembler.reset();
        self.dropped = 0;
        let mut discarding = false;

        loop {
            let line = lines.next_line()?.ok_or(ReceiveError::InputClosed)?;

            let record = match Record::parse(&line) {
                Ok(record) => record,
                Err(err) => {
                    debug!("Dropped line ({err}): {}", String::from_utf8_lossy(&line));
                    self.dropped += 1;
                    continue;
                }
            };

            if discarding {
                if record.rtype == RecordType::EndOfFile {
                    info!("End of discarded transfer, waiting for a new image");
                    self.assembler.reset();
                    discarding = false;
                }
                continue;
            }

            match self.assembler.process(&record) {
                Ok(Progress::Continue) => {}
                Ok(Progress::BlockReceived(_)) => {
                    send_status(status, MSG_BLOCK_RECEIVED);
                }
                Ok(Progress::EndOfFile(0)) => {
                    warn!("End of file without data, ignored");
                }
                Ok(Progress::EndOfFile(length)) => {
                    return self.finish(length, status, flash, reset);
                }
                Err(err @ StageError::Overflow { .. }) => {
                    warn!("{err}");
                    send_status(status, MSG_DISCARDING);
                    discarding = true;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn finish<W, F, C>(
        &mut self,
        length: usize,
        status: &mut W,
        flash: &mut F,
        reset: &mut C,
    ) -> Result<RebootRequested, ReceiveError>
    where
        W: Write,
        F: FlashStorage,
        C: ResetController,
    {
        info!(
            "Image complete: {length} bytes from {} records, {} lines dropped",
            self.assembler.records(),
            self.dropped
        );
        send_status(status, MSG_STORING);

        let region = self.assembler.staging_mut().flash_region_mut();
        let image = stage(flash, &self.config, region, length)?;

        send_status(
            status,
            &format!(
                "Rebooting into flashloader in {}\r\n",
                format_delay(self.config.reboot_delay_ms)
            ),
        );

        Ok(request_reboot(reset, &self.config, image))
    }
}

/// Status text is informational; a failed write never stops the transfer.
fn send_status<W: Write>(status: &mut W, message: &str) {
    if let Err(err) = status
        .write_all(message.as_bytes())
        .and_then(|()| status.flush())
    {
        warn!("Status text {:?} not sent: {err}", message.trim_end());
    }
}

fn format_delay(delay_ms: u32) -> String {
    match delay_ms {
        1000 => String::from("1 second"),
        ms if ms % 1000 == 0 => format!("{} seconds", ms / 1000),
        ms => format!("{ms} ms"),
    }
}
