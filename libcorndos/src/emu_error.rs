use thiserror::Error;
use unicorn_engine::unicorn_const::uc_error;

/// Ways a whole emulation session can fail. Problems inside a single DOS
/// call (bad guest pointers, unknown selectors) are not represented here;
/// those fail the call through the carry flag and leave the session alive.
#[derive(Debug, Error)]
pub enum EmuError {
	#[error("could not read image {}: {}", .path.display(), .source)]
	ImageNotFound {
		path: std::path::PathBuf,
		source: std::io::Error,
	},
	#[error("invalid image size: {size} bytes")]
	ImageSizeInvalid { size: u64 },
	#[error("could not map guest memory: {0:?}")]
	MemoryMap(uc_error),
	#[error("could not initialise the CPU emulation context: {0:?}")]
	EmulationContext(uc_error),
	#[error("guest address range 0x{address:x}+{length} is outside the emulated address space")]
	GuestAddress { address: u32, length: usize },
	#[error("CPU emulation fault: {0:?}")]
	Runtime(uc_error),
}
