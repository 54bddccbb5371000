/// Error codes the DOS services hand back in AX when the carry flag is set.
/// http://stanislavs.org/helppc/dos_error_codes.html
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum DosErrorCode {
	FileNotFound = 0x02,
	PathNotFound = 0x03,
	AccessDenied = 0x05,
	InvalidFileHandle = 0x06,
	InsufficientMemory = 0x08,
	InvalidFileAccessMode = 0x0c,
	InvalidData = 0x0d,
	FileAlreadyExists = 0x50,
}
