//! Replay command implementation

use std::fs;
use std::path::Path;

use usbasp_core::Programmer;
use usbasp_dummy::{Completed, DummyBoard, DummyProgrammer, DummyTarget, LoopbackUsb, Transfer};

use crate::cli::ReplayArgs;
use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::script::{parse_script, Step};

/// Replay a transcript and report every transfer
pub fn run_replay(args: &ReplayArgs) -> Result<(), BenchError> {
    let config = match &args.target {
        Some(path) => BenchConfig::from_file(path)?,
        None => BenchConfig::default(),
    };

    let text = fs::read_to_string(&args.transcript)
        .map_err(|e| BenchError::io(&args.transcript, e))?;
    let base = args.transcript.parent().unwrap_or_else(|| Path::new("."));
    let steps = parse_script(&text, base)?;
    log::info!(
        "Loaded {} transfers from {}",
        steps.len(),
        args.transcript.display()
    );

    let mut target = DummyTarget::new(config.dummy_config());
    if let Some(path) = &args.flash_image {
        let image = fs::read(path).map_err(|e| BenchError::io(path, e))?;
        load_flash_image(&mut target, &image)?;
        log::info!("Preloaded {} bytes of flash from {}", image.len(), path.display());
    }
    let board = DummyBoard::new(config.board.slow_sck_jumper);

    let (prog, results) = replay(Programmer::new(target, board), steps);

    let mut stalls = 0;
    for (line, completed) in &results {
        print_completed(*line, completed);
        if completed.result.is_err() {
            stalls += 1;
        }
    }
    print_summary(&prog);

    if let Some(path) = &args.dump_flash {
        fs::write(path, prog.isp().flash()).map_err(|e| BenchError::io(path, e))?;
        log::info!("Wrote flash to {}", path.display());
    }
    if let Some(path) = &args.dump_eeprom {
        fs::write(path, prog.isp().eeprom()).map_err(|e| BenchError::io(path, e))?;
        log::info!("Wrote EEPROM to {}", path.display());
    }

    if stalls > 0 {
        if !args.allow_stalls {
            return Err(BenchError::Stalled { count: stalls });
        }
        log::warn!("{} transfer(s) stalled", stalls);
    }

    Ok(())
}

fn load_flash_image(target: &mut DummyTarget, image: &[u8]) -> Result<(), BenchError> {
    let capacity = target.flash().len();
    if image.len() > capacity {
        return Err(BenchError::ImageTooLarge {
            len: image.len(),
            capacity,
        });
    }
    target.flash_mut()[..image.len()].copy_from_slice(image);
    Ok(())
}

/// Run all steps through the firmware loop
///
/// Returns the programmer and each finished transfer with its line number.
fn replay(
    mut prog: DummyProgrammer,
    steps: Vec<Step>,
) -> (DummyProgrammer, Vec<(usize, Completed)>) {
    let mut usb = LoopbackUsb::new();
    prog.init(&mut usb);

    let lines: Vec<usize> = steps.iter().map(|step| step.line).collect();
    for step in steps {
        usb.submit(step.transfer);
    }
    while usb.pending() > 0 {
        prog.poll(&mut usb);
    }

    let results = lines.into_iter().zip(usb.take_completed()).collect();
    (prog, results)
}

fn print_completed(line: usize, completed: &Completed) {
    let req = completed.transfer.request();
    let name = req.function().map(|f| f.name()).unwrap_or("unknown");
    println!(
        "{:>4}: {:<16} wValue=0x{:04X} wIndex=0x{:04X} wLength={}",
        line,
        name,
        req.value(),
        req.index(),
        req.length()
    );

    match (&completed.transfer, &completed.result) {
        (_, Err(e)) => println!("      !! {}", e),
        (Transfer::Out(_, data), Ok(_)) => println!("      -> {} bytes", data.len()),
        (Transfer::In(_), Ok(data)) if data.is_empty() => println!("      <- (no data)"),
        (Transfer::In(_), Ok(data)) => {
            println!("      <- {} bytes", data.len());
            print_hex(data);
        }
    }
}

fn print_hex(data: &[u8]) {
    for (row, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        println!("         {:04X}  {}", row * 16, hex.join(" "));
    }
}

fn print_summary(prog: &DummyProgrammer) {
    let session = prog.session();
    let target = prog.isp();
    println!();
    println!("Session state:   {}", session.state());
    println!("Address:         0x{:08X}", session.address());
    println!("Long addressing: {}", session.long_address_mode());
    println!("Page flushes:    {}", target.flush_addresses().len());
    if target.pending_page_bytes() > 0 {
        println!("Unflushed bytes: {}", target.pending_page_bytes());
    }
}
