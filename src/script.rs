//! Transcript parsing
//!
//! A transcript lists the control transfers a host would issue, one per
//! line. `#` starts a comment. Numbers are decimal or `0x` hex. Data is
//! given as hex bytes (`de ad be ef` or `deadbeef`) or as `@file`, read
//! relative to the transcript.
//!
//! ```text
//! connect
//! enable-prog
//! transmit 30 00 00 00          # signature byte 0
//! sck 12
//! long-address 0x10000
//! read-flash 0x0000 260
//! write-flash 0x0000 64 first,last @blink.bin
//! write-eeprom 0x10 deadbeef
//! raw in c0 01 00 00 00 00 04 00
//! disconnect
//! ```
//!
//! `write-flash` takes the page size (0 for unpaged devices) and the block
//! flags: `first`, `last`, both separated by a comma, or `-` for none.

use std::fs;
use std::path::Path;

use usbasp_core::protocol::{BlockFlags, Function, WriteParams};
use usbasp_core::request::ControlRequest;
use usbasp_dummy::Transfer;

use crate::config::parse_number;
use crate::error::BenchError;

/// Largest page size the `wIndex` encoding can carry
const MAX_PAGE_SIZE: u32 = 0x0FFF;

/// One parsed transcript line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// 1-based line number in the transcript
    pub line: usize,
    /// Transfer to run
    pub transfer: Transfer,
}

/// Parse a whole transcript
pub fn parse_script(text: &str, base: &Path) -> Result<Vec<Step>, BenchError> {
    let mut steps = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let tokens: Vec<&str> = content.split_whitespace().collect();
        let Some((command, args)) = tokens.split_first() else {
            continue;
        };

        let transfer = parse_command(command, args, base)
            .map_err(|message| BenchError::Script { line, message })?;
        log::trace!("line {}: {:?}", line, transfer);
        steps.push(Step { line, transfer });
    }

    Ok(steps)
}

fn parse_command(command: &str, args: &[&str], base: &Path) -> Result<Transfer, String> {
    let request = match command {
        "connect" | "disconnect" | "enable-prog" => {
            expect_args(command, args, 0)?;
            let function = Function::ALL
                .into_iter()
                .find(|f| f.name() == command)
                .ok_or_else(|| format!("unknown function '{}'", command))?;
            ControlRequest::simple(function)
        }
        "transmit" => {
            let bytes = parse_hex_bytes(args)?;
            let bytes: [u8; 4] = bytes
                .try_into()
                .map_err(|_| "transmit takes exactly 4 bytes".to_string())?;
            ControlRequest::transmit(bytes)
        }
        "sck" => {
            expect_args(command, args, 1)?;
            ControlRequest::set_isp_sck(parse_u8(args[0])?)
        }
        "long-address" => {
            expect_args(command, args, 1)?;
            ControlRequest::set_long_address(parse_number(args[0])?)
        }
        "read-flash" | "read-eeprom" => {
            expect_args(command, args, 2)?;
            let address = parse_u16(args[0])?;
            let length = parse_u16(args[1])?;
            if command == "read-flash" {
                ControlRequest::read_flash(address, length)
            } else {
                ControlRequest::read_eeprom(address, length)
            }
        }
        "write-flash" => {
            if args.len() < 4 {
                return Err("usage: write-flash ADDR PAGESIZE FLAGS DATA".into());
            }
            let address = parse_u16(args[0])?;
            let page_size = parse_number(args[1])?;
            if page_size > MAX_PAGE_SIZE {
                return Err(format!(
                    "page size {} exceeds {}",
                    page_size, MAX_PAGE_SIZE
                ));
            }
            let params = WriteParams {
                page_size: page_size as u16,
                flags: parse_flags(args[2])?,
            };
            let data = parse_data(&args[3..], base)?;
            let request = ControlRequest::write_flash(address, params, data_length(&data)?);
            return Ok(Transfer::Out(request, data));
        }
        "write-eeprom" => {
            if args.len() < 2 {
                return Err("usage: write-eeprom ADDR DATA".into());
            }
            let address = parse_u16(args[0])?;
            let data = parse_data(&args[1..], base)?;
            let request = ControlRequest::write_eeprom(address, data_length(&data)?);
            return Ok(Transfer::Out(request, data));
        }
        "raw" => return parse_raw(args),
        other => return Err(format!("unknown command '{}'", other)),
    };

    Ok(Transfer::In(request))
}

/// `raw in|out S0..S7 [DATA]`
fn parse_raw(args: &[&str]) -> Result<Transfer, String> {
    let usage = || "usage: raw in|out <8 setup bytes> [DATA]".to_string();
    let (direction, rest) = args.split_first().ok_or_else(usage)?;
    if rest.len() < 8 {
        return Err(usage());
    }

    let setup: [u8; 8] = parse_hex_bytes(&rest[..8])?
        .try_into()
        .map_err(|_| usage())?;
    let request = ControlRequest::from_bytes(setup);

    match *direction {
        "in" if rest.len() == 8 => Ok(Transfer::In(request)),
        "in" => Err("IN transfers carry no data".into()),
        "out" => Ok(Transfer::Out(request, parse_hex_bytes(&rest[8..])?)),
        _ => Err(usage()),
    }
}

fn expect_args(command: &str, args: &[&str], count: usize) -> Result<(), String> {
    if args.len() != count {
        return Err(format!(
            "{} takes {} argument(s), got {}",
            command,
            count,
            args.len()
        ));
    }
    Ok(())
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let n = parse_number(s)?;
    u16::try_from(n).map_err(|_| format!("{} does not fit in 16 bits", s))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let n = parse_number(s)?;
    u8::try_from(n).map_err(|_| format!("{} does not fit in 8 bits", s))
}

fn parse_flags(s: &str) -> Result<BlockFlags, String> {
    let mut flags = BlockFlags::empty();
    if s == "-" || s == "none" {
        return Ok(flags);
    }
    for name in s.split(',') {
        match name {
            "first" => flags |= BlockFlags::FIRST,
            "last" => flags |= BlockFlags::LAST,
            other => return Err(format!("unknown block flag '{}'", other)),
        }
    }
    Ok(flags)
}

/// Hex bytes or `@file`
fn parse_data(args: &[&str], base: &Path) -> Result<Vec<u8>, String> {
    let data = match args {
        [file] if file.starts_with('@') => {
            let path = base.join(&file[1..]);
            fs::read(&path).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        _ => parse_hex_bytes(args)?,
    };

    if data.is_empty() {
        return Err("no data".into());
    }
    Ok(data)
}

fn data_length(data: &[u8]) -> Result<u16, String> {
    u16::try_from(data.len())
        .map_err(|_| format!("{} bytes exceed one control transfer", data.len()))
}

/// Each token is one or more hex bytes without separators
fn parse_hex_bytes(tokens: &[&str]) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    for token in tokens {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(*token);
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(format!("'{}' is not a sequence of hex bytes", token));
        }
        for i in (0..digits.len()).step_by(2) {
            let pair = digits
                .get(i..i + 2)
                .ok_or_else(|| format!("'{}' is not a sequence of hex bytes", token))?;
            let byte = u8::from_str_radix(pair, 16)
                .map_err(|_| format!("'{}' is not a sequence of hex bytes", token))?;
            bytes.push(byte);
        }
    }
    Ok(bytes)
}
