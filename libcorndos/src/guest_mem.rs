use crate::emu_error::EmuError;

use byteorder::{ByteOrder, LittleEndian};

/// Everything a real mode address can reach:
/// https://en.wikipedia.org/wiki/Real_mode
pub const MEM_SIZE: usize = 1 << 20;

/// Resolves a real mode segment:offset pair to an absolute address within
/// the emulated address space.
pub fn resolve_address(segment: u16, offset: u16) -> Result<u32, EmuError> {
	let absolute = segment as u32 * 16 + offset as u32;
	if absolute as usize >= MEM_SIZE {
		return Err(EmuError::GuestAddress{address: absolute, length: 1});
	}
	Ok(absolute)
}

fn range_end(address: u32, length: usize) -> Result<usize, EmuError> {
	let end = (address as usize).checked_add(length).filter(|&end| end <= MEM_SIZE);
	match end {
		Some(end) => Ok(end),
		None => Err(EmuError::GuestAddress{address, length}),
	}
}

/// Staging buffer for the guest address space. The image loader and the PSP
/// builder assemble the initial process picture in here before it gets
/// pushed into the CPU emulator's mapped memory in one go.
pub struct GuestMemory {
	bytes: Vec<u8>,
}

impl GuestMemory {
	pub fn new() -> GuestMemory {
		GuestMemory{bytes: vec![0; MEM_SIZE]}
	}

	/// Every access is bounds checked up front; a rejected access leaves the
	/// buffer untouched.
	pub fn read_bytes(&self, address: u32, length: usize) -> Result<&[u8], EmuError> {
		let end = range_end(address, length)?;
		Ok(&self.bytes[address as usize..end])
	}

	pub fn write_bytes(&mut self, address: u32, data: &[u8]) -> Result<(), EmuError> {
		let end = range_end(address, data.len())?;
		self.bytes[address as usize..end].copy_from_slice(data);
		Ok(())
	}

	pub fn read_u8(&self, address: u32) -> Result<u8, EmuError> {
		Ok(self.read_bytes(address, 1)?[0])
	}

	pub fn write_u8(&mut self, address: u32, value: u8) -> Result<(), EmuError> {
		self.write_bytes(address, &[value])
	}

	pub fn read_u16(&self, address: u32) -> Result<u16, EmuError> {
		Ok(LittleEndian::read_u16(self.read_bytes(address, 2)?))
	}

	pub fn write_u16(&mut self, address: u32, value: u16) -> Result<(), EmuError> {
		let mut data = [0; 2];
		LittleEndian::write_u16(&mut data, value);
		self.write_bytes(address, &data)
	}
}
