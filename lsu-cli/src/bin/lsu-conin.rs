//! Standalone CLI tool for writing a key event into this console's input
//! buffer.

use clap::Parser;
use lsu_native::{ControlKeyState, KeyEvent};

#[derive(Parser)]
#[command(name = "lsu-conin", about = "Write a key event to CONIN$ via WriteConsoleInputW")]
struct Args {
    /// Virtual key code (hex, e.g. 0x4C for L)
    #[arg(long, value_parser = parse_hex_or_dec, default_value = "0x4C")]
    key: u16,

    /// Character carried by the event
    #[arg(long = "char", default_value = "L")]
    character: char,

    /// Send a key-down event (default is key-up)
    #[arg(long)]
    down: bool,

    /// Repeat count
    #[arg(long, default_value = "1")]
    repeat: u16,

    /// Virtual scan code (hex or decimal)
    #[arg(long, value_parser = parse_hex_or_dec, default_value = "0")]
    scan: u16,

    /// Control key state bitmask (hex or decimal)
    #[arg(long, value_parser = parse_hex_or_dec_u32, default_value = "0")]
    control: u32,

    /// Write the fixed "L" key-up event, ignoring the other options
    #[arg(long)]
    legacy: bool,
}

fn parse_hex_or_dec_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<u32>().map_err(|e| e.to_string())
    }
}

fn parse_hex_or_dec(s: &str) -> Result<u16, String> {
    let value = parse_hex_or_dec_u32(s)?;
    u16::try_from(value).map_err(|_| format!("{s} does not fit in 16 bits"))
}

fn build_event(args: &Args) -> lsu_native::Result<KeyEvent> {
    if args.legacy {
        return Ok(KeyEvent::letter_l_release());
    }
    let event = KeyEvent::key(args.key)
        .repeat(args.repeat)
        .scan_code(args.scan)
        .control_state(ControlKeyState(args.control))
        .with_char(args.character)?;
    Ok(if args.down { event.pressed() } else { event.released() })
}

#[cfg(windows)]
fn write(event: KeyEvent) -> lsu_native::Result<lsu_native::console::WriteOutcome> {
    let conin = lsu_native::console::ConsoleInput::open()?;
    Ok(conin.write_one(event))
}

#[cfg(not(windows))]
fn write(_event: KeyEvent) -> lsu_native::Result<lsu_native::console::WriteOutcome> {
    Err(lsu_native::NativeError::InvalidArgument(
        "console input is only available on Windows".into(),
    ))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let outcome = build_event(&args).and_then(|event| {
        log::debug!("writing {event:?}");
        write(event)
    });

    match outcome {
        Ok(outcome) => {
            match serde_json::to_string(&outcome) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("JSON serialization failed: {e}"),
            }
            if !outcome.success {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("lsu-conin: {e}");
            std::process::exit(1);
        }
    }
}
