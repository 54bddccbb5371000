use crate::emu_error::EmuError;
use crate::guest_mem::{resolve_address, GuestMemory};

// http://stanislavs.org/helppc/program_segment_prefix.html
// https://en.wikipedia.org/wiki/Program_Segment_Prefix
pub const PSP_BYTES: usize = 0x100;

// Offsets of the fields this builder fills in. Everything else stays zero.
const PSP_EXIT_STUB: u32 = 0x00;
const PSP_FAR_CALL_STUB: u32 = 0x50;
const PSP_FIRST_FCB: u32 = 0x5c;
const PSP_COMMAND_TAIL_LENGTH: u32 = 0x80;
const PSP_COMMAND_TAIL: u32 = 0x81;

/// Longest command tail content that fits: the tail area holds 127 bytes and
/// the 0x0d terminator always follows the content.
pub const COMMAND_TAIL_CAPACITY: usize = 0x7e;

/// Builds the Program Segment Prefix at the start of the given segment.
/// `guest_args` are the command line arguments the emulated program should
/// see in its command tail.
pub fn build_psp(memory: &mut GuestMemory, segment: u16, guest_args: &[String]) -> Result<(), EmuError> {
	let psp_base = resolve_address(segment, 0)?;

	// INT 20h: the CP/M style exit entry at offset zero.
	memory.write_bytes(psp_base + PSP_EXIT_STUB, &[0xcd, 0x20])?;
	// INT 21h; RETF: lets a program reach the DOS services with a far call.
	memory.write_bytes(psp_base + PSP_FAR_CALL_STUB, &[0xcd, 0x21, 0xcb])?;
	// The first FCB starts out unopened, with a blank drive and name.
	memory.write_bytes(psp_base + PSP_FIRST_FCB, &[0x01, 0x20])?;

	let tail = pack_command_tail(guest_args);
	memory.write_u8(psp_base + PSP_COMMAND_TAIL_LENGTH, tail.len() as u8)?;
	memory.write_bytes(psp_base + PSP_COMMAND_TAIL, &tail)?;
	memory.write_u8(psp_base + PSP_COMMAND_TAIL + tail.len() as u32, 0x0d)?;

	Ok(())
}

/// Joins the arguments the way DOS presents them: each one preceded by a
/// single space. Overflowing arguments are truncated, never an error.
fn pack_command_tail(guest_args: &[String]) -> Vec<u8> {
	let mut tail = Vec::new();
	for arg in guest_args {
		if tail.len() >= COMMAND_TAIL_CAPACITY {
			break;
		}
		tail.push(b' ');
		for &byte in arg.as_bytes() {
			if tail.len() >= COMMAND_TAIL_CAPACITY {
				break;
			}
			tail.push(byte);
		}
	}
	tail
}
