// End to end runs of small hand assembled programs through the whole stack:
// load, PSP build, execution, DOS services, teardown.

use libcorndos::com_loader::ComImage;
use libcorndos::dos_console::BufferConsole;
use libcorndos::dos_emulator::DosEmulator;
use libcorndos::dos_file_system::StandardDosFileSystem;

use unicorn_engine::RegisterX86;

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

fn scratch_dir(tag: &str) -> PathBuf {
	let dir = std::env::temp_dir().join(format!("corndos-emu-{}-{}", tag, std::process::id()));
	std::fs::remove_dir_all(&dir).ok();
	std::fs::create_dir_all(&dir).unwrap();
	dir
}

fn emulator_in(root: PathBuf, image_bytes: &[u8], input: &[u8], guest_args: &[&str]) -> (DosEmulator<'static>, Rc<RefCell<Vec<u8>>>) {
	let console = BufferConsole::with_input(input);
	let output = console.output_handle();
	let file_system = StandardDosFileSystem::new(root);
	let mut emulator = DosEmulator::new(Box::new(console), Box::new(file_system)).unwrap();
	let image = ComImage::from_bytes(image_bytes.to_vec()).unwrap();
	let args: Vec<String> = guest_args.iter().map(|arg| arg.to_string()).collect();
	emulator.load_com_image(&image, &args).unwrap();
	(emulator, output)
}

fn emulator_with(image_bytes: &[u8], input: &[u8], guest_args: &[&str]) -> (DosEmulator<'static>, Rc<RefCell<Vec<u8>>>) {
	emulator_in(std::env::temp_dir(), image_bytes, input, guest_args)
}

#[test]
fn exit_interrupt_ends_the_program() {
	// int 20h
	let (mut emulator, output) = emulator_with(&[0xcd, 0x20], b"", &[]);
	assert_eq!(emulator.run().unwrap(), 0);
	assert!(output.borrow().is_empty());
}

#[test]
fn exit_code_comes_back_from_the_terminate_call() {
	// mov ax, 0x4c07; int 21h
	let program = [0xb8, 0x07, 0x4c, 0xcd, 0x21];
	let (mut emulator, _output) = emulator_with(&program, b"", &[]);
	assert_eq!(emulator.run().unwrap(), 7);
	assert_eq!(emulator.handler().exit_code(), Some(7));
}

#[test]
fn writes_one_character() {
	// mov ah, 2; mov dl, 'A'; int 21h; int 20h
	let program = [0xb4, 0x02, 0xb2, 0x41, 0xcd, 0x21, 0xcd, 0x20];
	let (mut emulator, output) = emulator_with(&program, b"", &[]);
	assert_eq!(emulator.run().unwrap(), 0);
	assert_eq!(output.borrow().as_slice(), b"A");
}

#[test]
fn writes_a_dollar_terminated_string() {
	// mov ah, 9; mov dx, 0x109; int 21h; int 20h; db "hi$"
	let program = [
		0xb4, 0x09,
		0xba, 0x09, 0x01,
		0xcd, 0x21,
		0xcd, 0x20,
		b'h', b'i', b'$',
	];
	let (mut emulator, output) = emulator_with(&program, b"", &[]);
	assert_eq!(emulator.run().unwrap(), 0);
	assert_eq!(output.borrow().as_slice(), b"hi");
}

#[test]
fn reads_a_character_with_echo() {
	// mov ah, 1; int 21h; int 20h
	let program = [0xb4, 0x01, 0xcd, 0x21, 0xcd, 0x20];
	let (mut emulator, output) = emulator_with(&program, b"x", &[]);
	assert_eq!(emulator.run().unwrap(), 0);
	assert_eq!(emulator.register(RegisterX86::AX).unwrap() & 0xff, b'x' as u64);
	assert_eq!(output.borrow().as_slice(), b"x");
}

#[test]
fn exhausted_input_reads_as_end_of_file() {
	// mov ah, 8; int 21h; int 20h
	let program = [0xb4, 0x08, 0xcd, 0x21, 0xcd, 0x20];
	let (mut emulator, _output) = emulator_with(&program, b"", &[]);
	assert_eq!(emulator.run().unwrap(), 0);
	assert_eq!(emulator.register(RegisterX86::AX).unwrap() & 0xff, 0x1a);
}

#[test]
fn unknown_function_preserves_registers_and_continues() {
	// mov ax, 0xde42; mov bx, 0x1234; int 21h; int 20h
	let program = [0xb8, 0x42, 0xde, 0xbb, 0x34, 0x12, 0xcd, 0x21, 0xcd, 0x20];
	let (mut emulator, output) = emulator_with(&program, b"", &[]);
	assert_eq!(emulator.run().unwrap(), 0);
	assert_eq!(emulator.register(RegisterX86::AX).unwrap(), 0xde42);
	assert_eq!(emulator.register(RegisterX86::BX).unwrap(), 0x1234);
	assert!(output.borrow().is_empty());
}

#[test]
fn reports_dos_version_five() {
	// mov ah, 0x30; int 21h; int 20h
	let program = [0xb4, 0x30, 0xcd, 0x21, 0xcd, 0x20];
	let (mut emulator, _output) = emulator_with(&program, b"", &[]);
	assert_eq!(emulator.run().unwrap(), 0);
	assert_eq!(emulator.register(RegisterX86::AX).unwrap(), 0x0005);
}

#[test]
fn command_tail_is_visible_to_the_program() {
	let (mut emulator, _output) = emulator_with(&[0xcd, 0x20], b"", &["foo", "bar"]);
	assert_eq!(emulator.run().unwrap(), 0);
	let tail = emulator.read_memory(0x80, 10).unwrap();
	assert_eq!(tail.as_slice(), b"\x08 foo bar\x0d");
}

#[test]
fn psp_stubs_are_in_place() {
	let (emulator, _output) = emulator_with(&[0xcd, 0x20], b"", &[]);
	assert_eq!(emulator.read_memory(0x00, 2).unwrap().as_slice(), &[0xcd, 0x20]);
	assert_eq!(emulator.read_memory(0x50, 3).unwrap().as_slice(), &[0xcd, 0x21, 0xcb]);
	assert_eq!(emulator.read_memory(0x5c, 2).unwrap().as_slice(), &[0x01, 0x20]);
}

#[test]
fn bad_guest_pointer_fails_the_call_but_not_the_run() {
	// mov ax, 0xffff; mov ds, ax; mov ah, 9; mov dx, 0x100; int 21h; int 20h
	// DS:DX resolves past the end of the address space, so the write string
	// call comes back with carry set and the program still exits cleanly.
	let program = [
		0xb8, 0xff, 0xff,
		0x8e, 0xd8,
		0xb4, 0x09,
		0xba, 0x00, 0x01,
		0xcd, 0x21,
		0xcd, 0x20,
	];
	let (mut emulator, output) = emulator_with(&program, b"", &[]);
	assert_eq!(emulator.run().unwrap(), 0);
	assert_eq!(emulator.register(RegisterX86::EFLAGS).unwrap() & 1, 1);
	assert_eq!(emulator.register(RegisterX86::AX).unwrap(), 0x000d);
	assert!(output.borrow().is_empty());
}

#[test]
fn file_create_write_read_seek_round_trip() {
	let dir = scratch_dir("roundtrip");
	// mov ah, 0x3c; xor cx, cx; mov dx, name; int 21h     create
	// mov bx, ax; mov ah, 0x40; mov cx, 5; mov dx, data; int 21h  write
	// mov ah, 0x3e; int 21h                               close
	// mov ah, 0x3d; mov al, 0; mov dx, name; int 21h      reopen
	// mov bx, ax; mov ah, 0x3f; mov cx, 5; mov dx, 0x300; int 21h  read
	// mov ah, 0x42; mov al, 0; xor cx, cx; mov dx, 1; int 21h     seek
	// mov ah, 0x3f; mov cx, 4; mov dx, 0x320; int 21h     read again
	// int 20h; name: db "OUT.TXT",0; data: db "hello"
	let mut program = vec![
		0xb4, 0x3c,
		0x31, 0xc9,
		0xba, 0x45, 0x01,
		0xcd, 0x21,
		0x89, 0xc3,
		0xb4, 0x40,
		0xb9, 0x05, 0x00,
		0xba, 0x4d, 0x01,
		0xcd, 0x21,
		0xb4, 0x3e,
		0xcd, 0x21,
		0xb4, 0x3d,
		0xb0, 0x00,
		0xba, 0x45, 0x01,
		0xcd, 0x21,
		0x89, 0xc3,
		0xb4, 0x3f,
		0xb9, 0x05, 0x00,
		0xba, 0x00, 0x03,
		0xcd, 0x21,
		0xb4, 0x42,
		0xb0, 0x00,
		0x31, 0xc9,
		0xba, 0x01, 0x00,
		0xcd, 0x21,
		0xb4, 0x3f,
		0xb9, 0x04, 0x00,
		0xba, 0x20, 0x03,
		0xcd, 0x21,
		0xcd, 0x20,
	];
	program.extend_from_slice(b"OUT.TXT\0");
	program.extend_from_slice(b"hello");

	let (mut emulator, _output) = emulator_in(dir.clone(), &program, b"", &[]);
	assert_eq!(emulator.run().unwrap(), 0);
	// Both reads landed in guest memory and the file exists host side.
	assert_eq!(emulator.read_memory(0x300, 5).unwrap().as_slice(), b"hello");
	assert_eq!(emulator.read_memory(0x320, 4).unwrap().as_slice(), b"ello");
	assert_eq!(emulator.register(RegisterX86::AX).unwrap(), 4);
	assert_eq!(std::fs::read(dir.join("OUT.TXT")).unwrap(), b"hello");
	std::fs::remove_dir_all(&dir).ok();
}
