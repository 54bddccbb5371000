use crate::dos_error_codes::DosErrorCode;

use std::io::{Read, Seek, Write};
use std::path::PathBuf;

/// Lowest handle the file system hands out. DOS reserves the handles below
/// it for the standard devices, which the syscall layer serves itself.
pub const FIRST_FILE_HANDLE: u16 = 5;

pub trait DosFileSystem : std::fmt::Debug {
	/// Returns a file handle if successful. Error code if not.
	fn create(&mut self, filename: &[u8], attributes: u16) -> Result<u16, DosErrorCode>;
	/// Returns a file handle if successful. Error code if not.
	fn open(&mut self, filename: &[u8], access_mode: DosFileAccessMode) -> Result<u16, DosErrorCode>;
	/// Returns error code if close failed.
	fn close(&mut self, handle: u16) -> Result<(), DosErrorCode>;
	/// Returns the byte count read. Error code if read failed.
	fn read(&mut self, handle: u16, destination: &mut [u8]) -> Result<u16, DosErrorCode>;
	/// Returns the byte count written. Error code if write failed.
	fn write(&mut self, handle: u16, data: &[u8]) -> Result<u16, DosErrorCode>;
	/// Returns the new position within the file relative to its start.
	/// Error code if seek failed.
	fn seek(&mut self, handle: u16, offset: u32, origin: DosFileSeekOrigin) -> Result<u32, DosErrorCode>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DosFileAccessMode {
	ReadOnly,
	WriteOnly,
	ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DosFileSeekOrigin {
	Start,
	Current,
	End,
}

fn std_file_error_to_dos_error(err: std::io::Error) -> DosErrorCode {
	match err.kind() {
		std::io::ErrorKind::NotFound => DosErrorCode::FileNotFound,
		std::io::ErrorKind::PermissionDenied => DosErrorCode::AccessDenied,
		std::io::ErrorKind::AlreadyExists => DosErrorCode::FileAlreadyExists,
		_ => {
			log::warn!("unexpected file error: {:?}", err);
			DosErrorCode::PathNotFound
		}
	}
}

/// Maps DOS file requests onto a single directory of the host file system.
#[derive(Debug)]
pub struct StandardDosFileSystem {
	root_path: PathBuf,
	file_handles: Vec<Option<std::fs::File>>,
}

impl StandardDosFileSystem {
	pub fn new(root_path: PathBuf) -> StandardDosFileSystem {
		StandardDosFileSystem{root_path, file_handles: vec![]}
	}

	fn get_empty_slot(&mut self) -> usize {
		match self.file_handles.iter().position(|slot| slot.is_none()) {
			Some(pos) => pos,
			None => {
				self.file_handles.push(None);
				self.file_handles.len() - 1
			}
		}
	}

	/// DOS file names are case-insensitive and the host's may not be, so an
	/// existing directory entry that matches ignoring case wins over the
	/// name as given.
	fn get_real_filepath(&self, filename: &[u8]) -> Result<PathBuf, DosErrorCode> {
		if filename.contains(&b'\\') {
			// Subdirectories are not mapped; every name lives in the root.
			return Err(DosErrorCode::PathNotFound);
		}
		let string_filename = String::from_utf8_lossy(filename).into_owned();
		if let Ok(read_dir) = std::fs::read_dir(&self.root_path) {
			for dir_entry in read_dir.flatten() {
				if let Ok(entry_name) = dir_entry.file_name().into_string() {
					if entry_name.eq_ignore_ascii_case(&string_filename) {
						return Ok(self.root_path.join(entry_name));
					}
				}
			}
		}
		Ok(self.root_path.join(string_filename))
	}

	fn file_for_handle(&mut self, handle: u16) -> Result<&mut std::fs::File, DosErrorCode> {
		if handle < FIRST_FILE_HANDLE {
			return Err(DosErrorCode::InvalidFileHandle);
		}
		let slot = (handle - FIRST_FILE_HANDLE) as usize;
		match self.file_handles.get_mut(slot) {
			Some(Some(file)) => Ok(file),
			_ => Err(DosErrorCode::InvalidFileHandle),
		}
	}
}

impl DosFileSystem for StandardDosFileSystem {
	fn create(&mut self, filename: &[u8], _attributes: u16) -> Result<u16, DosErrorCode> {
		let real_filepath = self.get_real_filepath(filename)?;
		let slot = self.get_empty_slot();
		match std::fs::File::create(real_filepath) {
			Ok(file) => {
				self.file_handles[slot] = Some(file);
				Ok(slot as u16 + FIRST_FILE_HANDLE)
			}
			Err(err) => Err(std_file_error_to_dos_error(err)),
		}
	}

	fn open(&mut self, filename: &[u8], access_mode: DosFileAccessMode) -> Result<u16, DosErrorCode> {
		let real_filepath = self.get_real_filepath(filename)?;
		let slot = self.get_empty_slot();

		let mut open_options = std::fs::OpenOptions::new();
		open_options
			.read(access_mode == DosFileAccessMode::ReadOnly || access_mode == DosFileAccessMode::ReadWrite)
			.write(access_mode == DosFileAccessMode::WriteOnly || access_mode == DosFileAccessMode::ReadWrite);

		match open_options.open(real_filepath) {
			Ok(file) => {
				self.file_handles[slot] = Some(file);
				Ok(slot as u16 + FIRST_FILE_HANDLE)
			}
			Err(err) => Err(std_file_error_to_dos_error(err)),
		}
	}

	fn close(&mut self, handle: u16) -> Result<(), DosErrorCode> {
		self.file_for_handle(handle)?;
		self.file_handles[(handle - FIRST_FILE_HANDLE) as usize] = None;
		Ok(())
	}

	fn read(&mut self, handle: u16, destination: &mut [u8]) -> Result<u16, DosErrorCode> {
		let file = self.file_for_handle(handle)?;
		match file.read(destination) {
			Ok(read_count) => Ok(read_count as u16),
			Err(err) => Err(std_file_error_to_dos_error(err)),
		}
	}

	fn write(&mut self, handle: u16, data: &[u8]) -> Result<u16, DosErrorCode> {
		let file = self.file_for_handle(handle)?;
		match file.write(data) {
			Ok(write_count) => Ok(write_count as u16),
			Err(err) => Err(std_file_error_to_dos_error(err)),
		}
	}

	fn seek(&mut self, handle: u16, offset: u32, origin: DosFileSeekOrigin) -> Result<u32, DosErrorCode> {
		let file = self.file_for_handle(handle)?;
		let seek_from = match origin {
			DosFileSeekOrigin::Start => std::io::SeekFrom::Start(offset as u64),
			// Origins relative to the current position and the end take the
			// offset as signed.
			DosFileSeekOrigin::Current => std::io::SeekFrom::Current(offset as i32 as i64),
			DosFileSeekOrigin::End => std::io::SeekFrom::End(offset as i32 as i64),
		};
		match file.seek(seek_from) {
			Ok(file_pos) => Ok(file_pos as u32),
			Err(err) => Err(std_file_error_to_dos_error(err)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scratch_dir(tag: &str) -> PathBuf {
		let dir = std::env::temp_dir().join(format!("corndos-fs-{}-{}", tag, std::process::id()));
		std::fs::remove_dir_all(&dir).ok();
		std::fs::create_dir_all(&dir).unwrap();
		dir
	}

	#[test] fn test_handles_count_up_from_five() {
		let dir = scratch_dir("handles");
		let mut fs = StandardDosFileSystem::new(dir.clone());
		assert_eq!(fs.create(b"first.txt", 0).unwrap(), 5);
		assert_eq!(fs.create(b"second.txt", 0).unwrap(), 6);
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test] fn test_close_frees_the_slot() {
		let dir = scratch_dir("close");
		let mut fs = StandardDosFileSystem::new(dir.clone());
		let handle = fs.create(b"a.txt", 0).unwrap();
		fs.close(handle).unwrap();
		assert_eq!(fs.close(handle), Err(DosErrorCode::InvalidFileHandle));
		// The freed slot is reused before a new one is added.
		assert_eq!(fs.create(b"b.txt", 0).unwrap(), handle);
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test] fn test_read_write_seek_round_trip() {
		let dir = scratch_dir("roundtrip");
		let mut fs = StandardDosFileSystem::new(dir.clone());
		let handle = fs.create(b"data.bin", 0).unwrap();
		assert_eq!(fs.write(handle, b"abcdef").unwrap(), 6);
		fs.close(handle).unwrap();

		let handle = fs.open(b"data.bin", DosFileAccessMode::ReadOnly).unwrap();
		let mut buffer = [0u8; 3];
		assert_eq!(fs.read(handle, &mut buffer).unwrap(), 3);
		assert_eq!(&buffer, b"abc");
		assert_eq!(fs.seek(handle, 4, DosFileSeekOrigin::Start).unwrap(), 4);
		assert_eq!(fs.read(handle, &mut buffer).unwrap(), 2);
		assert_eq!(&buffer[..2], b"ef");
		// Seeking back from the end with a negative offset.
		assert_eq!(fs.seek(handle, -2i32 as u32, DosFileSeekOrigin::End).unwrap(), 4);
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test] fn test_open_is_case_insensitive() {
		let dir = scratch_dir("case");
		let mut fs = StandardDosFileSystem::new(dir.clone());
		let handle = fs.create(b"Readme.Txt", 0).unwrap();
		fs.close(handle).unwrap();
		assert!(fs.open(b"README.TXT", DosFileAccessMode::ReadOnly).is_ok());
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test] fn test_open_missing_file_fails() {
		let dir = scratch_dir("missing");
		let mut fs = StandardDosFileSystem::new(dir.clone());
		assert_eq!(
			fs.open(b"nope.txt", DosFileAccessMode::ReadOnly),
			Err(DosErrorCode::FileNotFound)
		);
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test] fn test_backslash_paths_are_rejected() {
		let dir = scratch_dir("backslash");
		let mut fs = StandardDosFileSystem::new(dir.clone());
		assert_eq!(
			fs.open(b"sub\\file.txt", DosFileAccessMode::ReadOnly),
			Err(DosErrorCode::PathNotFound)
		);
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test] fn test_device_handles_are_not_files() {
		let mut fs = StandardDosFileSystem::new(std::env::temp_dir());
		let mut buffer = [0u8; 1];
		assert_eq!(fs.read(0, &mut buffer), Err(DosErrorCode::InvalidFileHandle));
		assert_eq!(fs.write(4, b"x"), Err(DosErrorCode::InvalidFileHandle));
		assert_eq!(fs.close(5), Err(DosErrorCode::InvalidFileHandle));
	}

	#[test] fn test_std_error_mapping() {
		let not_found = std::io::Error::from(std::io::ErrorKind::NotFound);
		assert_eq!(std_file_error_to_dos_error(not_found), DosErrorCode::FileNotFound);
		let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
		assert_eq!(std_file_error_to_dos_error(denied), DosErrorCode::AccessDenied);
		let exists = std::io::Error::from(std::io::ErrorKind::AlreadyExists);
		assert_eq!(std_file_error_to_dos_error(exists), DosErrorCode::FileAlreadyExists);
	}
}
