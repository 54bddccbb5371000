use crate::dos_console::{DosConsole, DOS_EOF_CHAR};
use crate::dos_error_codes::DosErrorCode;
use crate::dos_file_system::{DosFileAccessMode, DosFileSeekOrigin, DosFileSystem};
use crate::guest_mem::{resolve_address, MEM_SIZE};
use crate::machine::{Flag, MachineX86};

use unicorn_engine::unicorn_const::uc_error;
use unicorn_engine::{RegisterX86, Unicorn};

use std::time::Instant;

/// Vector of the CP/M style exit interrupt.
pub const INTERRUPT_PROGRAM_EXIT: u32 = 0x20;
/// Vector of the DOS services interrupt.
pub const INTERRUPT_DOS_API: u32 = 0x21;

// Handles DOS gives every process for the standard devices.
const STDIN_HANDLE: u16 = 0;
const STDOUT_HANDLE: u16 = 1;
const STDERR_HANDLE: u16 = 2;

/// A CPU emulation context carrying the DOS layer as its data value.
pub type DosMachine<'a> = Unicorn<'a, DosEventHandler>;

/// State of the DOS layer for one emulation session. It lives inside the
/// CPU emulation context so the interrupt hook can reach it, and everything
/// it can do to the outside world comes in through the console and file
/// system values handed to `new`.
#[derive(Debug)]
pub struct DosEventHandler {
	pub console: Box<dyn DosConsole>,
	pub file_system: Box<dyn DosFileSystem>,
	// Programs save and restore interrupt vectors around installing their
	// own handlers. Segment zero holds the PSP rather than a real vector
	// table, so the entries live here as (offset, segment) pairs.
	interrupt_vectors: [(u16, u16); 256],
	break_flag: bool,
	start_time: Instant,
	exit_code: Option<u8>,
}

impl DosEventHandler {
	pub fn new(console: Box<dyn DosConsole>, file_system: Box<dyn DosFileSystem>) -> DosEventHandler {
		DosEventHandler {
			console,
			file_system,
			interrupt_vectors: [(0, 0); 256],
			break_flag: false,
			start_time: Instant::now(),
			exit_code: None,
		}
	}

	/// Exit status recorded by a termination request, if one has happened.
	pub fn exit_code(&self) -> Option<u8> {
		self.exit_code
	}

	/// Entry point for the CPU emulator's interrupt trap. Register access
	/// can only fail if the emulation context itself has gone bad, so that
	/// case is reported and the interrupt dropped.
	pub fn handle_interrupt(machine: &mut DosMachine, interrupt_index: u32) {
		if machine.get_data().exit_code.is_some() {
			// Nothing more is serviced once termination has been requested.
			return;
		}
		if let Err(err) = Self::dispatch_interrupt(machine, interrupt_index) {
			log::error!("interrupt 0x{:02x}: register access failed: {:?}", interrupt_index, err);
		}
	}

	fn dispatch_interrupt(machine: &mut DosMachine, interrupt_index: u32) -> Result<(), uc_error> {
		match interrupt_index {
			INTERRUPT_PROGRAM_EXIT => Self::terminate(machine, 0),
			INTERRUPT_DOS_API => Self::handle_dos_interrupt(machine),
			_ => {
				// BIOS and other vectors are not serviced; report and resume.
				let ip = machine.reg_u16(RegisterX86::IP)?;
				let ah = machine.reg_u8(RegisterX86::AH)?;
				log::warn!("0x{:04x}: unhandled interrupt 0x{:02x}, function 0x{:02x}", ip, interrupt_index, ah);
				Ok(())
			}
		}
	}

	/// Records the exit status and winds down the emulation. The run loop
	/// picks the status up once `emu_start` returns.
	fn terminate(machine: &mut DosMachine, exit_code: u8) -> Result<(), uc_error> {
		machine.get_data_mut().exit_code = Some(exit_code);
		machine.emu_stop()
	}

	// http://stanislavs.org/helppc/int_21.html
	// http://www.ctyme.com/intr/int-21.htm
	fn handle_dos_interrupt(machine: &mut DosMachine) -> Result<(), uc_error> {
		let dos_int = machine.reg_u8(RegisterX86::AH)?;
		match dos_int {
			0x00 => {
				// Terminate process, the CP/M compatible way.
				Self::terminate(machine, 0)
			}
			0x01 => {
				// Read character from standard input, with echo.
				let ch = machine.get_data_mut().console.read_char();
				machine.get_data_mut().console.write_char(ch);
				machine.set_reg_u8(RegisterX86::AL, ch)
			}
			0x02 => {
				// Write the character in DL. AL returns the character written.
				let ch = machine.reg_u8(RegisterX86::DL)?;
				machine.get_data_mut().console.write_char(ch);
				machine.set_reg_u8(RegisterX86::AL, ch)
			}
			0x06 => {
				// Direct console IO: DL = 0xff polls for input, any other
				// value is written out.
				let dl = machine.reg_u8(RegisterX86::DL)?;
				if dl == 0xff {
					match machine.get_data_mut().console.poll_char() {
						Some(ch) => {
							machine.set_flag(Flag::Zero, false)?;
							machine.set_reg_u8(RegisterX86::AL, ch)
						}
						None => {
							machine.set_flag(Flag::Zero, true)?;
							machine.set_reg_u8(RegisterX86::AL, 0)
						}
					}
				} else {
					machine.get_data_mut().console.write_char(dl);
					machine.set_reg_u8(RegisterX86::AL, dl)
				}
			}
			0x07 | 0x08 => {
				// Read character without echo. 0x07 also skips Ctrl+Break
				// filtering, which never happens here in the first place.
				let ch = machine.get_data_mut().console.read_char();
				machine.set_reg_u8(RegisterX86::AL, ch)
			}
			0x09 => Self::int21_write_string(machine),
			0x0b => {
				// Input status: AL = 0xff when a character is waiting.
				let pending = machine.get_data().console.has_pending();
				machine.set_reg_u8(RegisterX86::AL, if pending { 0xff } else { 0 })
			}
			0x25 => {
				// Install the vector for interrupt AL from DS:DX.
				let index = machine.reg_u8(RegisterX86::AL)?;
				let segment = machine.reg_u16(RegisterX86::DS)?;
				let offset = machine.reg_u16(RegisterX86::DX)?;
				machine.get_data_mut().interrupt_vectors[index as usize] = (offset, segment);
				Ok(())
			}
			0x2c => {
				// Get system time. Reported as time since the session
				// started rather than wall clock time.
				let seconds_since_start = machine.get_data().start_time.elapsed().as_secs_f64();
				let hundredths = ((seconds_since_start * 100.) as usize % 100) as u8;
				let second = (seconds_since_start as usize % 60) as u8;
				let minute = ((seconds_since_start / 60.) as usize % 60) as u8;
				let hour = ((seconds_since_start / 60. / 60.) as usize % 24) as u8;
				machine.set_reg_u8(RegisterX86::CH, hour)?;
				machine.set_reg_u8(RegisterX86::CL, minute)?;
				machine.set_reg_u8(RegisterX86::DH, second)?;
				machine.set_reg_u8(RegisterX86::DL, hundredths)
			}
			0x30 => {
				// DOS version: everything here behaves like DOS 5.0.
				machine.set_reg_u16(RegisterX86::AX, 0x0005)?;
				machine.set_reg_u16(RegisterX86::BX, 0)?;
				machine.set_reg_u16(RegisterX86::CX, 0)
			}
			0x33 => {
				// Extended Ctrl+Break checking. The flag is stored but has
				// no further effect.
				let sub_function = machine.reg_u8(RegisterX86::AL)?;
				match sub_function {
					0x00 => {
						let on = machine.get_data().break_flag;
						machine.set_reg_u8(RegisterX86::DL, if on { 1 } else { 0 })
					}
					0x01 => {
						let dl = machine.reg_u8(RegisterX86::DL)?;
						machine.get_data_mut().break_flag = dl != 0;
						Ok(())
					}
					_ => {
						log::warn!("unknown Ctrl+Break subfunction: 0x{:02x}", sub_function);
						Ok(())
					}
				}
			}
			0x35 => {
				// Read the vector for interrupt AL back into ES:BX.
				let index = machine.reg_u8(RegisterX86::AL)?;
				let (offset, segment) = machine.get_data().interrupt_vectors[index as usize];
				machine.set_reg_u16(RegisterX86::BX, offset)?;
				machine.set_reg_u16(RegisterX86::ES, segment)
			}
			0x3c => Self::int21_create(machine),
			0x3d => Self::int21_open(machine),
			0x3e => Self::int21_close(machine),
			0x3f => Self::int21_read(machine),
			0x40 => Self::int21_write(machine),
			0x42 => Self::int21_seek(machine),
			0x44 => Self::int21_ioctl(machine),
			0x4c => {
				// Terminate with the exit code in AL.
				let exit_code = machine.reg_u8(RegisterX86::AL)?;
				Self::terminate(machine, exit_code)
			}
			_ => {
				// Unknown selector: report it and resume with every
				// register left as it was.
				let ip = machine.reg_u16(RegisterX86::IP)?;
				log::warn!("0x{:04x}: unknown DOS function 0x{:02x}", ip, dos_int);
				Ok(())
			}
		}
	}

	fn set_error_result(machine: &mut DosMachine, code: DosErrorCode) -> Result<(), uc_error> {
		machine.set_flag(Flag::Carry, true)?;
		machine.set_reg_u16(RegisterX86::AX, code as u16)
	}

	fn set_ok_result(machine: &mut DosMachine, ax: u16) -> Result<(), uc_error> {
		machine.set_flag(Flag::Carry, false)?;
		machine.set_reg_u16(RegisterX86::AX, ax)
	}

	/// Bounds check for a guest buffer, done before any host work happens.
	fn buffer_address(segment: u16, offset: u16, length: usize) -> Result<u32, DosErrorCode> {
		let address = resolve_address(segment, offset).map_err(|_| DosErrorCode::InvalidData)?;
		if address as usize + length > MEM_SIZE {
			return Err(DosErrorCode::InsufficientMemory);
		}
		Ok(address)
	}

	/// Reads guest bytes from segment:offset up to and excluding the first
	/// `terminator`. The scan stops at the end of the 64KB segment or of the
	/// mapped space, whichever comes first; a missing terminator fails the
	/// call rather than running on through unrelated memory.
	fn read_terminated_string(machine: &mut DosMachine, segment: u16, offset: u16, terminator: u8) -> Result<Result<Vec<u8>, DosErrorCode>, uc_error> {
		let address = match resolve_address(segment, offset) {
			Ok(address) => address,
			Err(_) => return Ok(Err(DosErrorCode::InvalidData)),
		};
		let span_to_segment_end = 0x10000 - offset as usize;
		let span = span_to_segment_end.min(MEM_SIZE - address as usize);
		let mut buffer = vec![0u8; span];
		machine.mem_read(address as u64, &mut buffer)?;
		match buffer.iter().position(|&b| b == terminator) {
			Some(end) => {
				buffer.truncate(end);
				Ok(Ok(buffer))
			}
			None => {
				log::debug!("string at 0x{:04x}:0x{:04x} has no terminator before the segment end", segment, offset);
				Ok(Err(DosErrorCode::InvalidData))
			}
		}
	}

	fn int21_write_string(machine: &mut DosMachine) -> Result<(), uc_error> {
		// Write the $-terminated string at DS:DX.
		let segment = machine.reg_u16(RegisterX86::DS)?;
		let offset = machine.reg_u16(RegisterX86::DX)?;
		match Self::read_terminated_string(machine, segment, offset, b'$')? {
			Ok(text) => {
				let handler = machine.get_data_mut();
				for &ch in &text {
					handler.console.write_char(ch);
				}
				// AL comes back holding the terminator.
				machine.set_reg_u8(RegisterX86::AL, b'$')
			}
			Err(code) => Self::set_error_result(machine, code),
		}
	}

	fn int21_create(machine: &mut DosMachine) -> Result<(), uc_error> {
		// Create or truncate the file named by the ASCIIZ string at DS:DX.
		let segment = machine.reg_u16(RegisterX86::DS)?;
		let offset = machine.reg_u16(RegisterX86::DX)?;
		let attributes = machine.reg_u16(RegisterX86::CX)?;
		let filename = match Self::read_terminated_string(machine, segment, offset, 0)? {
			Ok(filename) => filename,
			Err(code) => return Self::set_error_result(machine, code),
		};
		let result = machine.get_data_mut().file_system.create(&filename, attributes);
		match result {
			Ok(handle) => Self::set_ok_result(machine, handle),
			Err(code) => Self::set_error_result(machine, code),
		}
	}

	fn int21_open(machine: &mut DosMachine) -> Result<(), uc_error> {
		// Open the file named by the ASCIIZ string at DS:DX; AL holds the
		// access mode.
		let segment = machine.reg_u16(RegisterX86::DS)?;
		let offset = machine.reg_u16(RegisterX86::DX)?;
		let access_mode = match machine.reg_u8(RegisterX86::AL)? {
			0 => DosFileAccessMode::ReadOnly,
			1 => DosFileAccessMode::WriteOnly,
			2 => DosFileAccessMode::ReadWrite,
			_ => return Self::set_error_result(machine, DosErrorCode::InvalidFileAccessMode),
		};
		let filename = match Self::read_terminated_string(machine, segment, offset, 0)? {
			Ok(filename) => filename,
			Err(code) => return Self::set_error_result(machine, code),
		};
		let result = machine.get_data_mut().file_system.open(&filename, access_mode);
		match result {
			Ok(handle) => Self::set_ok_result(machine, handle),
			Err(code) => Self::set_error_result(machine, code),
		}
	}

	fn int21_close(machine: &mut DosMachine) -> Result<(), uc_error> {
		// Close handle BX. Closing a standard device is accepted and ignored.
		let handle = machine.reg_u16(RegisterX86::BX)?;
		if handle <= STDERR_HANDLE {
			return machine.set_flag(Flag::Carry, false);
		}
		let result = machine.get_data_mut().file_system.close(handle);
		match result {
			Ok(()) => machine.set_flag(Flag::Carry, false),
			Err(code) => Self::set_error_result(machine, code),
		}
	}

	/// Reads for handle 0 come from the console a line at a time: the read
	/// ends at the requested count, at end of input, or just after a newline.
	fn read_console_line(console: &mut dyn DosConsole, buffer: &mut [u8]) -> u16 {
		let mut filled = 0;
		while filled < buffer.len() {
			let ch = console.read_char();
			if ch == DOS_EOF_CHAR {
				break;
			}
			buffer[filled] = ch;
			filled += 1;
			if ch == b'\n' {
				break;
			}
		}
		filled as u16
	}

	fn int21_read(machine: &mut DosMachine) -> Result<(), uc_error> {
		// Read CX bytes from handle BX into the buffer at DS:DX.
		let handle = machine.reg_u16(RegisterX86::BX)?;
		let count = machine.reg_u16(RegisterX86::CX)? as usize;
		let segment = machine.reg_u16(RegisterX86::DS)?;
		let offset = machine.reg_u16(RegisterX86::DX)?;
		let address = match Self::buffer_address(segment, offset, count) {
			Ok(address) => address,
			Err(code) => return Self::set_error_result(machine, code),
		};

		let mut buffer = vec![0u8; count];
		let result = if handle == STDIN_HANDLE {
			Ok(Self::read_console_line(machine.get_data_mut().console.as_mut(), &mut buffer))
		} else {
			machine.get_data_mut().file_system.read(handle, &mut buffer)
		};
		match result {
			Ok(read_count) => {
				buffer.truncate(read_count as usize);
				machine.mem_write(address as u64, &buffer)?;
				Self::set_ok_result(machine, read_count)
			}
			Err(code) => Self::set_error_result(machine, code),
		}
	}

	fn int21_write(machine: &mut DosMachine) -> Result<(), uc_error> {
		// Write CX bytes from DS:DX to handle BX.
		let handle = machine.reg_u16(RegisterX86::BX)?;
		let count = machine.reg_u16(RegisterX86::CX)? as usize;
		let segment = machine.reg_u16(RegisterX86::DS)?;
		let offset = machine.reg_u16(RegisterX86::DX)?;
		let address = match Self::buffer_address(segment, offset, count) {
			Ok(address) => address,
			Err(code) => return Self::set_error_result(machine, code),
		};

		let mut buffer = vec![0u8; count];
		machine.mem_read(address as u64, &mut buffer)?;
		let result = if handle == STDOUT_HANDLE || handle == STDERR_HANDLE {
			let handler = machine.get_data_mut();
			for &ch in &buffer {
				handler.console.write_char(ch);
			}
			Ok(count as u16)
		} else {
			machine.get_data_mut().file_system.write(handle, &buffer)
		};
		match result {
			Ok(write_count) => Self::set_ok_result(machine, write_count),
			Err(code) => Self::set_error_result(machine, code),
		}
	}

	fn int21_seek(machine: &mut DosMachine) -> Result<(), uc_error> {
		// Move the position of handle BX; the offset is CX:DX, origin AL.
		let handle = machine.reg_u16(RegisterX86::BX)?;
		let offset = ((machine.reg_u16(RegisterX86::CX)? as u32) << 16) + machine.reg_u16(RegisterX86::DX)? as u32;
		let origin = match machine.reg_u8(RegisterX86::AL)? {
			0 => DosFileSeekOrigin::Start,
			1 => DosFileSeekOrigin::Current,
			2 => DosFileSeekOrigin::End,
			_ => return Self::set_error_result(machine, DosErrorCode::InvalidData),
		};
		let result = machine.get_data_mut().file_system.seek(handle, offset, origin);
		match result {
			Ok(position) => {
				// The new position comes back in DX:AX.
				machine.set_reg_u16(RegisterX86::DX, (position >> 16) as u16)?;
				Self::set_ok_result(machine, (position & 0xffff) as u16)
			}
			Err(code) => Self::set_error_result(machine, code),
		}
	}

	fn int21_ioctl(machine: &mut DosMachine) -> Result<(), uc_error> {
		// IO control. Only the device information query is served.
		let io_function = machine.reg_u8(RegisterX86::AL)?;
		match io_function {
			0x00 => {
				let handle = machine.reg_u16(RegisterX86::BX)?;
				// 0x80d3 is what DOS reports for the CON device; bit 7
				// distinguishes character devices from files.
				// http://stanislavs.org/helppc/int_21-44-0.html
				let device_info = if handle <= STDERR_HANDLE { 0x80d3 } else { 0x0000 };
				machine.set_reg_u16(RegisterX86::DX, device_info)?;
				machine.set_flag(Flag::Carry, false)
			}
			_ => {
				log::warn!("unknown IO control subfunction: 0x{:02x}", io_function);
				Ok(())
			}
		}
	}
}
