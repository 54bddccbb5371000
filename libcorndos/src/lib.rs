pub mod guest_mem;
pub mod com_loader;
pub mod psp_builder;
pub mod machine;
pub mod dos_console;
pub mod dos_file_system;
pub mod dos_error_codes;
pub mod dos_event_handler;
pub mod dos_emulator;
pub mod emu_error;

// https://en.wikipedia.org/wiki/COM_file
// https://en.wikipedia.org/wiki/Program_Segment_Prefix
// http://www.ctyme.com/intr/int-21.htm
