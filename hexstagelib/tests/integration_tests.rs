#![allow(clippy::panic)]

use hexstagelib::{
    FLASH_IMAGE_OFFSET, FLASH_MAGIC1, FLASH_MAGIC2, FlashHeader, LineReader, MSG_BLOCK_RECEIVED,
    MemoryFlash, ReceiveError, Receiver, ScratchRegisters, StageConfig, crc32, encode_image,
    staged_header_address,
};
use rand::Rng;
use zerocopy::IntoBytes;

const FLASH_SIZE: usize = 512 * 1024;

fn flash() -> MemoryFlash {
    MemoryFlash::new(FLASH_SIZE, 4096, 256)
}

fn to_crlf(text: &str) -> String {
    text.lines().map(|line| format!("{line}\r\n")).collect()
}

fn random_image(len: usize) -> Vec<u8> {
    rand::rng()
        .sample_iter(rand::distr::StandardUniform)
        .take(len)
        .collect()
}

#[test]
fn test_full_transfer_over_crlf() {
    // Arrange
    let image = random_image(20_000);
    let input = to_crlf(&encode_image(&image, 16));
    let mut flash = flash();
    let mut regs = ScratchRegisters::default();
    let mut status = Vec::new();
    let mut receiver = Receiver::new(StageConfig::new());

    // Act
    let res = receiver.run(
        &mut LineReader::new(input.as_bytes()),
        &mut status,
        &mut flash,
        &mut regs,
    );

    // Assert
    let reboot = res.unwrap_or_else(|e| panic!("transfer failed: {e}"));
    assert_eq!(reboot.image.header.length.get(), 20_000);
    assert_eq!(reboot.image.header.crc32.get(), crc32(&image, 0xFFFF_FFFF));
    assert_eq!(reboot.image.erase_length, 20_480);
    assert_eq!(receiver.dropped(), 0);

    let staged = &flash.as_bytes()[FLASH_IMAGE_OFFSET..];
    assert_eq!(&staged[..4], FLASH_MAGIC1.to_le_bytes());
    assert_eq!(&staged[4..8], FLASH_MAGIC2.to_le_bytes());
    assert_eq!(FlashHeader::validate(staged), Ok(&image[..]));

    assert_eq!(staged_header_address(&regs.scratch), Some(0x1002_0000));
    assert_eq!(regs.reboot_delay_ms, Some(1000));

    let text = String::from_utf8_lossy(&status);
    assert_eq!(text.matches(MSG_BLOCK_RECEIVED).count(), 19);
    assert!(text.ends_with("Rebooting into flashloader in 1 second\r\n"));
}

#[test]
fn test_single_byte_image_erases_one_sector() {
    // Arrange
    let mut flash = flash();
    let mut regs = ScratchRegisters::default();
    let mut receiver = Receiver::new(StageConfig::new());

    // Act
    let res = receiver.run(
        &mut LineReader::new(&b":01000000AA55\n:00000001FF\n"[..]),
        &mut Vec::new(),
        &mut flash,
        &mut regs,
    );

    // Assert
    let reboot = res.unwrap_or_else(|e| panic!("transfer failed: {e}"));
    assert_eq!(reboot.image.total_length, 17);
    assert_eq!(reboot.image.erase_length, 4096);
    assert_eq!(
        flash.as_bytes()[FLASH_IMAGE_OFFSET + 16..FLASH_IMAGE_OFFSET + 17],
        [0xAA]
    );
}

#[test]
fn test_flash_outside_staging_area_untouched() {
    // Arrange
    let mut flash = MemoryFlash::from_bytes(vec![0x3C; FLASH_SIZE], 4096, 256);
    let mut regs = ScratchRegisters::default();
    let mut receiver = Receiver::new(StageConfig::new());

    // Act
    let res = receiver.run(
        &mut LineReader::new(&b":0300300002337A1E\n:00000001FF\n"[..]),
        &mut Vec::new(),
        &mut flash,
        &mut regs,
    );

    // Assert
    assert!(res.is_ok());
    let bytes = flash.as_bytes();
    assert!(bytes[..FLASH_IMAGE_OFFSET].iter().all(|&b| b == 0x3C));
    assert!(bytes[FLASH_IMAGE_OFFSET + 4096..].iter().all(|&b| b == 0x3C));
    assert!(bytes[FLASH_IMAGE_OFFSET + 19..FLASH_IMAGE_OFFSET + 4096]
        .iter()
        .all(|&b| b == 0xFF));
}

#[test]
fn test_second_transfer_replaces_first() {
    // Arrange
    let first = random_image(5000);
    let second = vec![0x42; 100];
    let mut flash = flash();
    let mut regs = ScratchRegisters::default();
    let mut receiver = Receiver::new(StageConfig::new());
    let res = receiver.run(
        &mut LineReader::new(encode_image(&first, 32).as_bytes()),
        &mut Vec::new(),
        &mut flash,
        &mut regs,
    );
    assert!(res.is_ok());

    // Act
    let res = receiver.run(
        &mut LineReader::new(encode_image(&second, 32).as_bytes()),
        &mut Vec::new(),
        &mut flash,
        &mut regs,
    );

    // Assert
    assert_eq!(res.map(|r| r.image.header.length.get()).ok(), Some(100));
    assert_eq!(
        FlashHeader::validate(&flash.as_bytes()[FLASH_IMAGE_OFFSET..]),
        Ok(&second[..])
    );
    assert_eq!(receiver.assembler().image(), &second[..]);
}

#[test]
fn test_custom_staging_offset() {
    // Arrange
    let config = StageConfig {
        flash_image_offset: 0x4_0000,
        reboot_delay_ms: 500,
        ..StageConfig::new()
    };
    let mut flash = flash();
    let mut regs = ScratchRegisters::default();
    let mut status = Vec::new();
    let mut receiver = Receiver::new(config);

    // Act
    let res = receiver.run(
        &mut LineReader::new(&b":0300300002337A1E\n:00000001FF\n"[..]),
        &mut status,
        &mut flash,
        &mut regs,
    );

    // Assert
    assert!(res.is_ok());
    assert_eq!(regs.scratch[1], 0x1004_0000);
    assert_eq!(regs.reboot_delay_ms, Some(500));
    assert!(FlashHeader::validate(&flash.as_bytes()[0x4_0000..]).is_ok());
    assert!(String::from_utf8_lossy(&status).ends_with("in 500 ms\r\n"));
}

#[test]
fn test_input_closed_mid_transfer() {
    // Arrange
    let mut flash = flash();
    let before = flash.clone();
    let mut regs = ScratchRegisters::default();
    let mut receiver = Receiver::new(StageConfig::new());

    // Act
    let res = receiver.run(
        &mut LineReader::new(&b":0300300002337A1E\n"[..]),
        &mut Vec::new(),
        &mut flash,
        &mut regs,
    );

    // Assert
    assert!(matches!(res, Err(ReceiveError::InputClosed)));
    assert_eq!(flash, before);
    assert_eq!(regs, ScratchRegisters::default());
}

#[test]
fn test_header_bytes_match_written_flash() {
    // Arrange
    let mut flash = flash();
    let mut regs = ScratchRegisters::default();
    let mut receiver = Receiver::new(StageConfig::new());

    // Act
    let reboot = receiver
        .run(
            &mut LineReader::new(&b":0300300002337A1E\n:00000001FF\n"[..]),
            &mut Vec::new(),
            &mut flash,
            &mut regs,
        )
        .unwrap_or_else(|e| panic!("transfer failed: {e}"));

    // Assert
    assert_eq!(
        &flash.as_bytes()[FLASH_IMAGE_OFFSET..FLASH_IMAGE_OFFSET + FlashHeader::SIZE],
        reboot.image.header.as_bytes()
    );
}
