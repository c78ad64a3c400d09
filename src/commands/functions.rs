//! List command implementation

use usbasp_core::protocol::{Function, SckOption, USBASP_SHARED_PID, USBASP_SHARED_VID};

/// List the vendor requests and SCK options
pub fn list_functions() {
    println!(
        "USBasp vendor requests (VID 0x{:04X}, PID 0x{:04X}):",
        USBASP_SHARED_VID, USBASP_SHARED_PID
    );
    println!();
    println!("{:>4}  {:<18} {}", "bReq", "Function", "Data stage");
    println!("{}", "-".repeat(48));

    for function in Function::ALL {
        println!(
            "{:>4}  {:<18} {}",
            function.selector(),
            function.name(),
            data_stage(function)
        );
    }

    println!();
    println!("SCK options:");
    println!();
    for code in 0..=SckOption::Khz1500.code() {
        let option = SckOption::from_code(code);
        let note = if option == SckOption::Auto {
            " (driver default)"
        } else if option == SckOption::FORCED_SLOW {
            " (slow-SCK jumper)"
        } else {
            ""
        };
        println!(
            "{:>4}  {:>10}{}",
            code,
            format_frequency(option.frequency_hz()),
            note
        );
    }
}

fn data_stage(function: Function) -> &'static str {
    match function {
        Function::Connect | Function::Disconnect => "none",
        Function::Transmit => "IN, 4 byte ISP answer",
        Function::EnableProg => "IN, 1 byte status",
        Function::SetLongAddress => "none",
        Function::SetIspSck => "IN, 1 byte status",
        Function::ReadFlash | Function::ReadEeprom => "IN, streamed",
        Function::WriteFlash | Function::WriteEeprom => "OUT, streamed",
    }
}

fn format_frequency(hz: u32) -> String {
    if hz >= 1_000_000 {
        format!("{} MHz", hz as f32 / 1_000_000.0)
    } else if hz >= 1_000 {
        format!("{} kHz", hz as f32 / 1_000.0)
    } else {
        format!("{} Hz", hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_frequency() {
        assert_eq!(format_frequency(500), "500 Hz");
        assert_eq!(format_frequency(8_000), "8 kHz");
        assert_eq!(format_frequency(93_750), "93.75 kHz");
        assert_eq!(format_frequency(1_500_000), "1.5 MHz");
    }
}
