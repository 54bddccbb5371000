use crate::emu_error::EmuError;
use crate::guest_mem::GuestMemory;

use std::io::Read;
use std::path::Path;

/// Flat images load right after the PSP:
/// https://en.wikipedia.org/wiki/COM_file
pub const COM_LOAD_OFFSET: usize = 0x100;

/// The largest image that still fits below the 64KB segment ceiling once it
/// has been placed at the load offset.
pub const COM_MAX_IMAGE_BYTES: usize = 0xff00;

/// A flat DOS executable image, validated but not yet placed in guest
/// memory. There is no header to parse; the file content is the program.
#[derive(Debug, Clone, PartialEq)]
pub struct ComImage {
	data: Vec<u8>,
}

impl ComImage {
	/// An empty file has no entry point and anything past 0xff00 bytes would
	/// run over the end of the segment, so both are rejected here.
	pub fn from_bytes(data: Vec<u8>) -> Result<ComImage, EmuError> {
		if data.is_empty() || data.len() > COM_MAX_IMAGE_BYTES {
			return Err(EmuError::ImageSizeInvalid{size: data.len() as u64});
		}
		Ok(ComImage{data})
	}

	pub fn read_from_file(path: &Path) -> Result<ComImage, EmuError> {
		let mut file = std::fs::File::open(path)
			.map_err(|source| EmuError::ImageNotFound{path: path.to_path_buf(), source})?;
		let size = file.metadata()
			.map_err(|source| EmuError::ImageNotFound{path: path.to_path_buf(), source})?
			.len();
		// Checked before reading so an over-long file never gets buffered.
		if size == 0 || size > COM_MAX_IMAGE_BYTES as u64 {
			return Err(EmuError::ImageSizeInvalid{size});
		}
		let mut data = Vec::with_capacity(size as usize);
		file.read_to_end(&mut data)
			.map_err(|source| EmuError::ImageNotFound{path: path.to_path_buf(), source})?;
		ComImage::from_bytes(data)
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	/// Copies the image into guest memory at the fixed load offset.
	pub fn load_into(&self, memory: &mut GuestMemory) -> Result<(), EmuError> {
		memory.write_bytes(COM_LOAD_OFFSET as u32, &self.data)
	}
}
