//! Standalone CLI tool for creating and inspecting job objects.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lsu-job", about = "Create and inspect Win32 job objects")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a job, optionally assign processes, print its process ids
    Create {
        /// Job name (anonymous when omitted)
        #[arg(long)]
        name: Option<String>,
        /// Terminate member processes when the last job handle closes
        #[arg(long)]
        kill_on_close: bool,
        /// Process ids to assign to the job
        #[arg(long, num_args = 1..)]
        assign: Vec<u32>,
        /// Keep the job open until Enter is pressed
        #[arg(long)]
        hold: bool,
    },
    /// Open an existing named job and print its process ids
    List {
        /// Job name
        name: String,
        /// Compact JSON output (no pretty-printing)
        #[arg(long)]
        compact: bool,
    },
}

#[cfg(windows)]
fn run(args: Args) -> lsu_native::Result<()> {
    use lsu_native::job::JobObject;

    match args.command {
        Command::Create {
            name,
            kill_on_close,
            assign,
            hold,
        } => {
            let job = JobObject::create(name.as_deref())?;
            log::info!("created job handle 0x{:X}", job.handle().as_raw());
            if kill_on_close {
                job.set_kill_on_close()?;
            }
            for pid in assign {
                job.assign_process_id(pid)?;
                log::info!("assigned pid {pid}");
            }
            print_json(&job.process_ids()?, false);

            if hold {
                eprintln!("Job open; press Enter to close it");
                let mut line = String::new();
                let _ = std::io::stdin().read_line(&mut line);
            }
            job.into_handle().close()
        }
        Command::List { name, compact } => {
            let job = JobObject::open(&name)?;
            print_json(&job.process_ids()?, compact);
            Ok(())
        }
    }
}

#[cfg(windows)]
fn print_json<T: serde::Serialize>(value: &T, compact: bool) {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("JSON serialization failed: {e}"),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    #[cfg(windows)]
    {
        if let Err(e) = run(args) {
            eprintln!("lsu-job: {e}");
            std::process::exit(1);
        }
    }

    #[cfg(not(windows))]
    {
        let _ = args;
        eprintln!("lsu-job: job objects are only available on Windows");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_parses_name() {
        let args = Args::parse_from(["lsu-job", "list", "build-agents", "--compact"]);
        match args.command {
            Command::List { name, compact } => {
                assert_eq!(name, "build-agents");
                assert!(compact);
            }
            Command::Create { .. } => panic!("expected list"),
        }
    }

    #[cfg(windows)]
    #[test]
    fn test_list_missing_job_fails_without_creating_it() {
        let name = format!("lsu-job-missing-{}", std::process::id());
        let err = run(Args::parse_from(["lsu-job", "list", &name])).unwrap_err();
        assert!(matches!(
            err,
            lsu_native::NativeError::Win32 {
                call: "OpenJobObjectW",
                ..
            }
        ));
        assert_ne!(err.code(), 0);
    }
}
