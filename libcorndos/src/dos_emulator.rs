use crate::com_loader::{ComImage, COM_LOAD_OFFSET};
use crate::dos_console::DosConsole;
use crate::dos_event_handler::{DosEventHandler, DosMachine};
use crate::dos_file_system::DosFileSystem;
use crate::emu_error::EmuError;
use crate::guest_mem::{GuestMemory, MEM_SIZE};
use crate::psp_builder::build_psp;

use unicorn_engine::unicorn_const::{Arch, Mode, Prot as Permission};
use unicorn_engine::{RegisterX86, Unicorn};

use std::path::Path;

/// Segment the emulated process lives in: PSP first, image from 0x100.
const PROCESS_SEGMENT: u16 = 0;
/// One 16-bit segment's worth of address space.
const SEGMENT_BYTES: u64 = 0x10000;

/// A single-shot emulation session: construct, load one image, run it.
/// The console and file system given to `new` are the only ways the guest
/// can touch the host.
pub struct DosEmulator<'a> {
	machine: DosMachine<'a>,
}

impl<'a> DosEmulator<'a> {
	/// Opens the CPU emulation context and maps the guest address space.
	pub fn new(console: Box<dyn DosConsole>, file_system: Box<dyn DosFileSystem>) -> Result<DosEmulator<'a>, EmuError> {
		let handler = DosEventHandler::new(console, file_system);
		let mut machine = Unicorn::new_with_data(Arch::X86, Mode::MODE_16, handler)
			.map_err(EmuError::EmulationContext)?;
		machine.mem_map(0, MEM_SIZE as _, Permission::ALL)
			.map_err(EmuError::MemoryMap)?;
		Ok(DosEmulator{machine})
	}

	/// Loads a flat image from disk. `guest_args` become the command tail.
	pub fn load_image(&mut self, path: &Path, guest_args: &[String]) -> Result<(), EmuError> {
		let image = ComImage::read_from_file(path)?;
		self.load_com_image(&image, guest_args)
	}

	/// Stages the initial process picture (PSP plus image), pushes it into
	/// the mapped memory and puts the registers in their documented start
	/// state: all segment registers on the process segment and the stack
	/// pointer at the top of it.
	pub fn load_com_image(&mut self, image: &ComImage, guest_args: &[String]) -> Result<(), EmuError> {
		let mut memory = GuestMemory::new();
		image.load_into(&mut memory)?;
		build_psp(&mut memory, PROCESS_SEGMENT, guest_args)?;

		let staged = memory.read_bytes(0, COM_LOAD_OFFSET + image.len())?;
		self.machine.mem_write(0, staged).map_err(EmuError::MemoryMap)?;

		self.machine.reg_write(RegisterX86::SP, 0xfffe)
			.map_err(EmuError::EmulationContext)?;
		for seg_reg in &[RegisterX86::CS, RegisterX86::DS, RegisterX86::ES, RegisterX86::SS] {
			self.machine.reg_write(*seg_reg, PROCESS_SEGMENT as u64)
				.map_err(EmuError::EmulationContext)?;
		}
		Ok(())
	}

	/// Runs the loaded image until it terminates and returns the guest's
	/// exit code. Running off the end of the segment counts as a plain exit;
	/// a CPU level fault comes back as an error.
	pub fn run(&mut self) -> Result<u8, EmuError> {
		self.machine.add_intr_hook(DosEventHandler::handle_interrupt)
			.map_err(EmuError::EmulationContext)?;

		let entry_point = COM_LOAD_OFFSET as u64;
		self.machine.emu_start(entry_point, entry_point + SEGMENT_BYTES, 0, 0)
			.map_err(EmuError::Runtime)?;

		match self.machine.get_data().exit_code() {
			Some(exit_code) => Ok(exit_code),
			None => {
				log::warn!("execution reached the end of the segment without terminating");
				Ok(0)
			}
		}
	}

	/// Direct view of mapped guest memory, mostly useful for inspecting
	/// what a program left behind.
	pub fn read_memory(&self, address: u32, length: usize) -> Result<Vec<u8>, EmuError> {
		if address as usize + length > MEM_SIZE {
			return Err(EmuError::GuestAddress{address, length});
		}
		let mut buffer = vec![0u8; length];
		self.machine.mem_read(address as u64, &mut buffer)
			.map_err(EmuError::Runtime)?;
		Ok(buffer)
	}

	/// Raw register read-back.
	pub fn register(&self, reg: RegisterX86) -> Result<u64, EmuError> {
		self.machine.reg_read(reg).map_err(EmuError::Runtime)
	}

	/// The DOS layer state, for inspection after a run.
	pub fn handler(&self) -> &DosEventHandler {
		self.machine.get_data()
	}
}
