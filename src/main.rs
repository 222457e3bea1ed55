use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{bail, IntoDiagnostic, Result};

use xpire::memory::MEMORY_SIZE;
use xpire::output::{self, file_message, message, MsgColor};
use xpire::{cpm, Assembly, RunState, Status};

/// Xpire runs Intel 8080 programs and assembles them from source.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a `.asm` source or a raw `.bin`, `.com` or `.rom` image
    Run {
        /// File to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Load at 0x0100 and serve CP/M console calls
        #[arg(long)]
        cpm: bool,
        /// Stop after this many instructions
        #[arg(long)]
        max_steps: Option<u64>,
    },
    /// Assemble a `.asm` file into a flat binary image
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output the image to
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
}

#[derive(Clone, Copy, Default)]
struct RunOptions {
    minimal: bool,
    cpm: bool,
    max_steps: Option<u64>,
}

fn main() -> Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    xpire::env::init()?;

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(xpire::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    match args.command {
        Some(Command::Run {
            name,
            minimal,
            cpm,
            max_steps,
        }) => run(
            &name,
            RunOptions {
                minimal,
                cpm,
                max_steps,
            },
        ),
        Some(Command::Compile { name, dest }) => {
            file_message(Green, "Assembling", &name);
            let image = assemble(&name)?.image;

            let out_file_name = dest.unwrap_or_else(|| name.with_extension("bin"));
            fs::write(&out_file_name, &image).into_diagnostic()?;

            message(Green, "Finished", &format!("emit binary ({} bytes)", image.len()));
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Some(Command::Check { name }) => {
            file_message(Green, "Checking", &name);
            let _ = assemble(&name)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        None => {
            if let Some(path) = args.path {
                run(&path, RunOptions::default())
            } else {
                println!("\n~ xpire v{VERSION} ~");
                println!("{SHORT_INFO}");
                std::process::exit(0);
            }
        }
    }
}

fn run(name: &Path, opts: RunOptions) -> Result<()> {
    use MsgColor::*;
    output::set_minimal(opts.minimal);

    // Where the image is placed in memory
    let (image, base) = match name.extension().and_then(|ext| ext.to_str()) {
        Some("asm") => {
            file_message(Green, "Assembling", name);
            let asm = assemble(name)?;
            // The system vectors live below the load address
            if opts.cpm && (asm.image.is_empty() || asm.start < cpm::LOAD_ADDR) {
                bail!("CP/M programs must start with `ORG 100h`.");
            }
            (asm.image, 0)
        }
        Some("bin" | "com" | "rom") => {
            file_message(Green, "Loading", name);
            let base = if opts.cpm { cpm::LOAD_ADDR } else { 0 };
            (fs::read(name).into_diagnostic()?, base)
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    };
    if base as usize + image.len() > MEMORY_SIZE {
        bail!("Image is {} bytes and cannot fit in memory.", image.len());
    }

    let max_steps = opts.max_steps.or_else(xpire::env::max_steps);
    let mut state = if opts.cpm {
        cpm::load(&image, base)
    } else {
        RunState::from_image(&image)
    };
    state.set_trace(xpire::env::is_trace_enabled());

    message(Green, "Running", "emitted binary");
    let result = if opts.cpm {
        cpm::run(&mut state, &mut io::stdout().lock(), max_steps)
    } else {
        match max_steps {
            Some(max) => state.run_for(max),
            None => state.run(),
        }
        .into_diagnostic()
    };

    match result {
        Ok(Status::Halted) => file_message(Green, "Halted", name),
        Ok(Status::Running) => message(
            Cyan,
            "Stopped",
            &format!("after {} instructions", state.steps()),
        ),
        Err(_) => message(Red, "Faulted", &format!("after {} instructions", state.steps())),
    }
    // The console output is the result of a CP/M program
    if !(opts.cpm && opts.minimal) {
        output::print_registers(&state);
    }
    result.map(|_| ())
}

/// Read and assemble a source file.
fn assemble(name: &Path) -> Result<Assembly> {
    let contents = fs::read_to_string(name).into_diagnostic()?;
    xpire::assemble(&contents)
}

const SHORT_INFO: &str = r"
Welcome to xpire, an Intel 8080 emulator with a companion assembler.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
