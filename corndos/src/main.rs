use libcorndos::dos_console::StandardDosConsole;
use libcorndos::dos_emulator::DosEmulator;
use libcorndos::dos_file_system::StandardDosFileSystem;
use libcorndos::emu_error::EmuError;

use std::path::PathBuf;

const USAGE: &str = "\
corndos: runs flat 16-bit DOS executables on an emulated CPU
Syntax: corndos <image.com> [arguments for the emulated program]
";

#[derive(Debug)]
struct Args {
	image_path: PathBuf,
	guest_args: Vec<String>,
}

fn parse_args() -> Result<Args, pico_args::Error> {
	let mut pargs = pico_args::Arguments::from_env();

	if pargs.contains(["-h", "--help"]) {
		print!("{}", USAGE);
		std::process::exit(0);
	}

	let image_path = pargs.free_from_str()?;
	let guest_args = pargs
		.finish()
		.into_iter()
		.map(|arg| arg.to_string_lossy().into_owned())
		.collect();

	Ok(Args{image_path, guest_args})
}

fn run(args: &Args) -> i32 {
	let console = Box::new(StandardDosConsole::new());
	// File requests are served relative to the host's working directory.
	let file_system = Box::new(StandardDosFileSystem::new(".".into()));

	let mut emulator = match DosEmulator::new(console, file_system) {
		Ok(emulator) => emulator,
		Err(err) => {
			eprintln!("Error: {}", err);
			return 1;
		}
	};

	if let Err(err) = emulator.load_image(&args.image_path, &args.guest_args) {
		eprintln!("Error: {}", err);
		return 1;
	}

	match emulator.run() {
		Ok(exit_code) => {
			log::debug!("program exited with code {}", exit_code);
			0
		}
		Err(err @ EmuError::Runtime(_)) => {
			// A fault inside the emulated program still counts as a
			// completed emulation.
			eprintln!("Error: {}", err);
			0
		}
		Err(err) => {
			eprintln!("Error: {}", err);
			1
		}
	}
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

	let args = match parse_args() {
		Ok(args) => args,
		Err(_) => {
			print!("{}", USAGE);
			std::process::exit(-1);
		}
	};

	std::process::exit(run(&args));
}
