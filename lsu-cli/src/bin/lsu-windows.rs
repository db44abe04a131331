//! Standalone CLI tool for dumping the windows owned by a thread as JSON.

use clap::Parser;

#[derive(Parser)]
#[command(name = "lsu-windows", about = "List a thread's windows via EnumThreadWindows")]
struct Args {
    /// Thread id whose windows to enumerate
    thread_id: u32,

    /// Only report visible windows
    #[arg(long)]
    visible_only: bool,

    /// Compact JSON output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

#[cfg(windows)]
fn run(args: &Args) -> Result<String, String> {
    let infos = lsu_native::window::thread_window_info(args.thread_id, args.visible_only)
        .map_err(|e| e.to_string())?;
    log::info!("thread {} owns {} window(s)", args.thread_id, infos.len());

    let json = if args.compact {
        serde_json::to_string(&infos)
    } else {
        serde_json::to_string_pretty(&infos)
    };
    json.map_err(|e| format!("JSON serialization failed: {e}"))
}

#[cfg(not(windows))]
fn run(_args: &Args) -> Result<String, String> {
    Err("window enumeration is only available on Windows".into())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("lsu-windows: {e}");
            std::process::exit(1);
        }
    }
}
