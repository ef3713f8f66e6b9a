use hexstagelib::{
    FlashHeader, LineReader, MemoryFlash, Receiver, STAGING_CAPACITY, ScratchRegisters,
    StageConfig, encode_image,
};
use log::{LevelFilter, info};
use simple_logger::SimpleLogger;
use std::env;
use std::fs;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;

/// Flash size used when the flash file does not exist yet
const DEFAULT_FLASH_SIZE: usize = 2 * 1024 * 1024;
/// Payload bytes per Data record written by `encode`
const ENCODE_RECORD_SIZE: usize = 16;

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");

    println!(" ----------------------------------------------");
    println!("|  Intel HEX Flash Stager  | v{version}            |");
    println!(" ----------------------------------------------");
    println!("\nUsage:");
    println!("  hexstager receive --flash <file> [options]");
    println!("  hexstager inspect <flash-file> [--offset <val>]");
    println!("  hexstager encode <input.bin> <output.hex>");
    println!("\nOptions:");
    println!("  --input <file>       Read records from a file instead of stdin");
    println!("  --flash <file>       Flash dump to stage into (created erased if missing)");
    println!("  --scratch <file>     Write the reset-surviving scratch words to a file");
    println!("  --offset <val>       Flash offset of the staged image (default: 0x20000)");
    println!("  --xip-base <val>     Address flash is mapped at (default: 0x10000000)");
    println!("  --flash-size <val>   Size of a newly created flash dump (default: 0x200000)");
    println!("  --verbose            Log decoding and staging details to stderr");
    println!("\nExamples:");
    println!("  hexstager receive --flash flash.bin --scratch scratch.txt < app.hex");
    println!("  hexstager inspect flash.bin");
    println!("  hexstager encode app.bin app.hex");
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    init_logger(args.iter().any(|arg| arg == "--verbose"));

    let command = &args[1];

    // Dispatch and immediately handle results
    if let Err(e) = run_dispatch(command, &args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logger(verbose: bool) {
    let logger = SimpleLogger::new().with_level(LevelFilter::Warn).env();
    let logger = if verbose {
        logger.with_level(LevelFilter::Debug)
    } else {
        logger
    };
    if let Err(e) = logger.init() {
        eprintln!("Warning: logging disabled: {e}");
    }
}

fn run_dispatch(cmd: &str, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        "help" | "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        "receive" => {
            // Guard: Flash dump path is required
            let flash_path = get_flag_value(args, "--flash")
                .map(PathBuf::from)
                .ok_or("Missing '--flash' flag or the value after it")?;

            // Guard: Input file must exist if given
            let input = match get_flag_value(args, "--input") {
                Some(path_str) => Some(validate_exists(&path_str)?),
                None => None,
            };

            let config = config_from_args(args)?;

            let flash_size = match get_flag_value(args, "--flash-size") {
                Some(size) => {
                    parse_hex_str(&size).map_err(|_e| format!("Invalid flash size: {size}"))?
                }
                None => DEFAULT_FLASH_SIZE,
            };

            let scratch_path = get_flag_value(args, "--scratch").map(PathBuf::from);

            run_receive(
                input.as_ref(),
                &flash_path,
                scratch_path.as_ref(),
                config,
                flash_size,
            )
        }
        "inspect" => {
            // Guard: Check args count
            let path_str = args.get(2).ok_or("Missing flash file path")?;

            // Guard: File must exist
            let abs_path = validate_exists(path_str)?;

            let config = config_from_args(args)?;

            run_inspect(&abs_path, &config)
        }
        "encode" => {
            // Guard: Check file path arguments given
            let in_path_str = args.get(2).ok_or("Missing input path")?;
            let out_path_str = args.get(3).ok_or("Missing output path")?;

            // Guard: Check input exists
            let in_abs_path = validate_exists(in_path_str)?;

            run_encode(&in_abs_path, &PathBuf::from(out_path_str))
        }
        _ => {
            print_usage();
            process::exit(1);
        }
    }
}

fn run_receive(
    input: Option<&PathBuf>,
    flash_path: &PathBuf,
    scratch_path: Option<&PathBuf>,
    config: StageConfig,
    flash_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut flash = if flash_path.exists() {
        MemoryFlash::from_bytes(fs::read(flash_path)?, config.sector_size, config.page_size)
    } else {
        MemoryFlash::new(flash_size, config.sector_size, config.page_size)
    };

    let mut regs = ScratchRegisters::default();
    let mut receiver = Receiver::new(config);
    let mut status = io::stdout().lock();

    let reboot = match input {
        Some(path) => {
            let mut lines = LineReader::new(BufReader::new(fs::File::open(path)?));
            receiver.run(&mut lines, &mut status, &mut flash, &mut regs)?
        }
        None => {
            let mut lines = LineReader::new(io::stdin().lock());
            receiver.run(&mut lines, &mut status, &mut flash, &mut regs)?
        }
    };

    fs::write(flash_path, flash.as_bytes())?;
    info!(
        "Wrote {} byte flash dump to {}",
        flash.as_bytes().len(),
        flash_path.display()
    );

    if let Some(path) = scratch_path {
        let words: String = regs
            .scratch
            .iter()
            .map(|word| format!("0x{word:08X}\n"))
            .collect();
        fs::write(path, words)?;
    }

    info!(
        "Staged {} bytes, {} lines dropped, reboot in {} ms",
        reboot.image.header.length.get(),
        receiver.dropped(),
        reboot.delay_ms
    );
    Ok(())
}

fn run_inspect(path: &PathBuf, config: &StageConfig) -> Result<(), Box<dyn std::error::Error>> {
    let flash = fs::read(path)?;

    let region = flash.get(config.flash_image_offset..).ok_or_else(|| {
        format!(
            "Offset 0x{:X} is past the end of {}",
            config.flash_image_offset,
            path.display()
        )
    })?;

    let header = FlashHeader::read(region)?;
    let payload = FlashHeader::validate(region)
        .map_err(|e| format!("No valid image at offset 0x{:X}: {e}", config.flash_image_offset))?;

    println!("File Path:   {}", path.display());
    println!(
        "Header:      0x{:08X} (flash offset 0x{:X})",
        config.header_address(),
        config.flash_image_offset
    );
    println!("Image Size:  {} bytes", payload.len());
    println!("CRC32:       0x{:08X}", header.crc32.get());
    Ok(())
}

fn run_encode(in_path: &PathBuf, out_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let image = fs::read(in_path)?;

    // Guard: The receiver stages at most one 64 KiB window
    if image.len() > STAGING_CAPACITY {
        return Err(format!(
            "Image is {} bytes, at most {STAGING_CAPACITY} bytes can be staged",
            image.len()
        )
        .into());
    }

    fs::write(out_path, encode_image(&image, ENCODE_RECORD_SIZE))?;

    // Validate output file was written
    let out_abs_path = validate_exists(&out_path.to_string_lossy())?;

    println!(
        "Encoded {} -> {}",
        in_path.display(),
        out_abs_path.display()
    );
    Ok(())
}

// =============================== HELPER FUNCTIONS ===============================

/// Build the staging configuration from `--offset` and `--xip-base`
fn config_from_args(args: &[String]) -> Result<StageConfig, Box<dyn std::error::Error>> {
    let mut config = StageConfig::new();

    if let Some(offset) = get_flag_value(args, "--offset") {
        config.flash_image_offset =
            parse_hex_str(&offset).map_err(|_e| format!("Invalid offset: {offset}"))?;

        // Guard: Erase starts at the image offset
        if config.flash_image_offset % config.sector_size != 0 {
            return Err(format!(
                "Offset {offset} is not aligned to a 0x{:X} byte sector",
                config.sector_size
            )
            .into());
        }
    }

    if let Some(base) = get_flag_value(args, "--xip-base") {
        config.xip_base = u32::try_from(
            parse_hex_str(&base).map_err(|_e| format!("Invalid XIP base: {base}"))?,
        )?;
    }
    Ok(config)
}

/// Parse a string as a hex number (with optional 0x prefix)
fn parse_hex_str(s: &str) -> Result<usize, std::num::ParseIntError> {
    let s = s.trim();

    // Handle explicit 0x prefix
    if let Some(hex_str) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return usize::from_str_radix(hex_str, 16);
    }

    // Parse as hex without prefix
    usize::from_str_radix(s, 16)
}

/// Validate that a path exists and is a file. Returns absolute path.
fn validate_exists(path_str: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = PathBuf::from(path_str);
    if !path.exists() {
        return Err(format!("File not found: {path_str}").into());
    }
    if !path.is_file() {
        return Err(format!("Path is not a file: {path_str}").into());
    }
    // Return absolute path
    Ok(fs::canonicalize(path)?)
}

/// Find the value after a specific flag (e.g., "--offset 0x20000")
fn get_flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|pos| args.get(pos + 1))
        .cloned()
}
