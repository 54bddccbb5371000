use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::rc::Rc;

/// End of input mark DOS programs expect from character devices (Ctrl+Z).
pub const DOS_EOF_CHAR: u8 = 0x1a;

/// Host side of the DOS character console. Blocking reads hold up the whole
/// emulation, which is what a waiting DOS program looks like anyway.
pub trait DosConsole : std::fmt::Debug {
	fn write_char(&mut self, ch: u8);
	/// Blocks until a character is available. End of input reads as 0x1a.
	fn read_char(&mut self) -> u8;
	/// Takes a pending character without blocking.
	fn poll_char(&mut self) -> Option<u8>;
	/// True if a character is waiting to be read.
	fn has_pending(&self) -> bool;
}

/// Console wired to the process's stdin and stdout. Pending-input checks
/// would need the terminal in raw mode, so polling always reports idle here;
/// blocking reads behave normally.
#[derive(Debug)]
pub struct StandardDosConsole;

impl StandardDosConsole {
	pub fn new() -> StandardDosConsole {
		StandardDosConsole
	}
}

impl DosConsole for StandardDosConsole {
	fn write_char(&mut self, ch: u8) {
		let stdout = std::io::stdout();
		let mut stdout = stdout.lock();
		stdout.write_all(&[ch]).ok();
		stdout.flush().ok();
	}

	fn read_char(&mut self) -> u8 {
		let mut buffer = [0u8; 1];
		let stdin = std::io::stdin();
		let mut stdin = stdin.lock();
		match stdin.read(&mut buffer) {
			Ok(0) => DOS_EOF_CHAR,
			Ok(_) => buffer[0],
			Err(err) => {
				log::warn!("console read failed: {}", err);
				DOS_EOF_CHAR
			}
		}
	}

	fn poll_char(&mut self) -> Option<u8> {
		None
	}

	fn has_pending(&self) -> bool {
		false
	}
}

/// Console over in-memory buffers: input comes from a prepared queue and
/// output accumulates in a shared buffer that stays readable while the
/// console itself is held by an emulation session.
#[derive(Debug)]
pub struct BufferConsole {
	input: VecDeque<u8>,
	output: Rc<RefCell<Vec<u8>>>,
}

impl BufferConsole {
	pub fn new() -> BufferConsole {
		BufferConsole{input: VecDeque::new(), output: Rc::new(RefCell::new(Vec::new()))}
	}

	pub fn with_input(input: &[u8]) -> BufferConsole {
		let mut console = BufferConsole::new();
		console.input.extend(input);
		console
	}

	/// Another handle on the output buffer, for inspecting what the guest
	/// wrote after the console has been moved into a session.
	pub fn output_handle(&self) -> Rc<RefCell<Vec<u8>>> {
		self.output.clone()
	}
}

impl DosConsole for BufferConsole {
	fn write_char(&mut self, ch: u8) {
		self.output.borrow_mut().push(ch);
	}

	fn read_char(&mut self) -> u8 {
		self.input.pop_front().unwrap_or(DOS_EOF_CHAR)
	}

	fn poll_char(&mut self) -> Option<u8> {
		self.input.pop_front()
	}

	fn has_pending(&self) -> bool {
		!self.input.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test] fn test_buffer_console_round_trip() {
		let mut console = BufferConsole::with_input(b"hi");
		let output = console.output_handle();
		assert!(console.has_pending());
		assert_eq!(console.read_char(), b'h');
		assert_eq!(console.poll_char(), Some(b'i'));
		assert_eq!(console.poll_char(), None);
		assert!(!console.has_pending());
		// Exhausted input reads as the DOS end of file character.
		assert_eq!(console.read_char(), DOS_EOF_CHAR);
		console.write_char(b'!');
		assert_eq!(output.borrow().as_slice(), b"!");
	}
}
