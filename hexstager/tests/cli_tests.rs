#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use hexstagelib::{FLASH_IMAGE_OFFSET, FlashHeader, MSG_STORING, encode_image};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

const HEXSTAGER_EXE: &str = env!("CARGO_BIN_EXE_hexstager");

/// Fresh scratch directory for one test
fn build_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("build").join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("Failed to create build directory");
    dir
}

fn run(args: &[&str]) -> Output {
    Command::new(HEXSTAGER_EXE)
        .args(args)
        .output()
        .expect("Failed to run hexstager")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn path_str(path: &PathBuf) -> &str {
    path.to_str().expect("Non UTF-8 test path")
}

#[test]
fn test_shows_help() {
    for arg in ["help", "-h", "--help"] {
        // Act
        let output = run(&[arg]);

        // Assert
        assert_success(&output);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(
            stdout.contains("Usage"),
            "stdout did not look like help text:\n{stdout}"
        );
    }
}

#[test]
fn test_receive_from_input_file() {
    // Arrange
    let dir = build_dir("receive_file");
    let input = dir.join("app.hex");
    let flash = dir.join("flash.bin");
    let scratch = dir.join("scratch.txt");
    fs::write(&input, ":0300300002337A1E\r\n:00000001FF\r\n").expect("Failed to write input");

    // Act
    let output = run(&[
        "receive",
        "--input",
        path_str(&input),
        "--flash",
        path_str(&flash),
        "--scratch",
        path_str(&scratch),
    ]);

    // Assert
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        format!("{MSG_STORING}Rebooting into flashloader in 1 second\r\n")
    );

    let dump = fs::read(&flash).expect("Flash dump was not written");
    assert_eq!(dump.len(), 2 * 1024 * 1024);
    assert_eq!(
        FlashHeader::validate(&dump[FLASH_IMAGE_OFFSET..]),
        Ok(&[0x02, 0x33, 0x7A][..])
    );

    let words = fs::read_to_string(&scratch).expect("Scratch file was not written");
    let words: Vec<&str> = words.lines().collect();
    assert_eq!(words.len(), 8);
    assert_eq!(words[0], "0x8ECD5EFB");
    assert_eq!(words[1], "0x10020000");
}

#[test]
fn test_receive_from_stdin_with_custom_layout() {
    // Arrange
    let dir = build_dir("receive_stdin");
    let flash = dir.join("flash.bin");
    let image: Vec<u8> = (0..=255).cycle().take(3000).collect();

    // Act
    let mut child = Command::new(HEXSTAGER_EXE)
        .args([
            "receive",
            "--flash",
            path_str(&flash),
            "--flash-size",
            "0x80000",
            "--offset",
            "0x40000",
            "--xip-base",
            "0x20000000",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to run hexstager");
    child
        .stdin
        .take()
        .expect("No stdin pipe")
        .write_all(encode_image(&image, 32).as_bytes())
        .expect("Failed to write records");
    let output = child.wait_with_output().expect("Failed to wait for hexstager");

    // Assert
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Received block\r\n").count(), 2);

    let dump = fs::read(&flash).expect("Flash dump was not written");
    assert_eq!(dump.len(), 0x8_0000);
    assert_eq!(
        FlashHeader::validate(&dump[0x4_0000..]),
        Ok(&image[..])
    );

    // Act
    let output = run(&["inspect", path_str(&flash), "--offset", "0x40000", "--xip-base", "0x20000000"]);

    // Assert
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("3000 bytes") && stdout.contains("0x20040000"),
        "stdout did not look like inspect text:\n{stdout}"
    );
}

#[test]
fn test_receive_keeps_existing_flash_contents() {
    // Arrange
    let dir = build_dir("receive_existing");
    let input = dir.join("app.hex");
    let flash = dir.join("flash.bin");
    fs::write(&input, ":0300300002337A1E\n:00000001FF\n").expect("Failed to write input");
    fs::write(&flash, vec![0x00; 0x4_0000]).expect("Failed to write flash");

    // Act
    let output = run(&["receive", "--input", path_str(&input), "--flash", path_str(&flash)]);

    // Assert
    assert_success(&output);
    let dump = fs::read(&flash).expect("Flash dump was not written");
    assert_eq!(dump.len(), 0x4_0000);
    assert!(dump[..FLASH_IMAGE_OFFSET].iter().all(|&b| b == 0x00));
    assert!(FlashHeader::validate(&dump[FLASH_IMAGE_OFFSET..]).is_ok());
}

#[test]
fn test_receive_without_end_of_file_fails() {
    // Arrange
    let dir = build_dir("receive_truncated");
    let input = dir.join("app.hex");
    let flash = dir.join("flash.bin");
    fs::write(&input, ":0300300002337A1E\n").expect("Failed to write input");

    // Act
    let output = run(&["receive", "--input", path_str(&input), "--flash", path_str(&flash)]);

    // Assert
    assert!(!output.status.success());
    assert!(!flash.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Error: Input closed before an end of file record"),
        "stderr did not look like error text:\n{stderr}"
    );
}

#[test]
fn test_receive_requires_flash_path() {
    // Act
    let output = run(&["receive"]);

    // Assert
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Missing '--flash'"),
        "stderr did not look like error text:\n{stderr}"
    );
}

#[test]
fn test_receive_rejects_unaligned_offset() {
    // Arrange
    let dir = build_dir("receive_unaligned");
    let flash = dir.join("flash.bin");

    // Act
    let output = run(&["receive", "--flash", path_str(&flash), "--offset", "0x20010"]);

    // Assert
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("not aligned"),
        "stderr did not look like error text:\n{stderr}"
    );
}

#[test]
fn test_inspect_erased_flash_fails() {
    // Arrange
    let dir = build_dir("inspect_erased");
    let flash = dir.join("flash.bin");
    fs::write(&flash, vec![0xFF; 0x4_0000]).expect("Failed to write flash");

    // Act
    let output = run(&["inspect", path_str(&flash)]);

    // Assert
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("No valid image at offset 0x20000"),
        "stderr did not look like error text:\n{stderr}"
    );
}

#[test]
fn test_encode_then_receive() {
    // Arrange
    let dir = build_dir("encode");
    let bin = dir.join("app.bin");
    let hex = dir.join("app.hex");
    let flash = dir.join("flash.bin");
    let image: Vec<u8> = (0..5000_u32).map(|i| (i * 7 % 251) as u8).collect();
    fs::write(&bin, &image).expect("Failed to write image");

    // Act
    let output = run(&["encode", path_str(&bin), path_str(&hex)]);

    // Assert
    assert_success(&output);
    let text = fs::read_to_string(&hex).expect("HEX file was not written");
    assert!(text.starts_with(":10000000"));
    assert!(text.trim_end().ends_with(":00000001FF"));

    // Act
    let output = run(&["receive", "--input", path_str(&hex), "--flash", path_str(&flash)]);

    // Assert
    assert_success(&output);
    let dump = fs::read(&flash).expect("Flash dump was not written");
    assert_eq!(
        FlashHeader::validate(&dump[FLASH_IMAGE_OFFSET..]),
        Ok(&image[..])
    );
}

#[test]
fn test_encode_rejects_oversized_image() {
    // Arrange
    let dir = build_dir("encode_oversized");
    let bin = dir.join("app.bin");
    fs::write(&bin, vec![0; 65537]).expect("Failed to write image");

    // Act
    let output = run(&["encode", path_str(&bin), path_str(&dir.join("app.hex"))]);

    // Assert
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("at most 65536 bytes"),
        "stderr did not look like error text:\n{stderr}"
    );
}
