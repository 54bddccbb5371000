use unicorn_engine::unicorn_const::uc_error;
use unicorn_engine::{RegisterX86, Unicorn};

/// CPU flags the DOS services report results through.
/// Bit positions per https://en.wikipedia.org/wiki/FLAGS_register
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Flag {
	Carry,
	Zero,
}

impl Flag {
	fn mask(self) -> u64 {
		match self {
			Flag::Carry => 1 << 0,
			Flag::Zero => 1 << 6,
		}
	}
}

/// Register access in the widths the DOS calling convention talks: whole
/// 16-bit registers and the 8-bit halves the CPU emulator exposes as
/// register ids of their own.
pub trait MachineX86 {
	fn reg_u8(&self, reg: RegisterX86) -> Result<u8, uc_error>;
	fn reg_u16(&self, reg: RegisterX86) -> Result<u16, uc_error>;
	fn set_reg_u8(&mut self, reg: RegisterX86, value: u8) -> Result<(), uc_error>;
	fn set_reg_u16(&mut self, reg: RegisterX86, value: u16) -> Result<(), uc_error>;
	fn flag(&self, flag: Flag) -> Result<bool, uc_error>;
	fn set_flag(&mut self, flag: Flag, value: bool) -> Result<(), uc_error>;
}

impl<'a, D> MachineX86 for Unicorn<'a, D> {
	fn reg_u8(&self, reg: RegisterX86) -> Result<u8, uc_error> {
		Ok(self.reg_read(reg)? as u8)
	}

	fn reg_u16(&self, reg: RegisterX86) -> Result<u16, uc_error> {
		Ok(self.reg_read(reg)? as u16)
	}

	fn set_reg_u8(&mut self, reg: RegisterX86, value: u8) -> Result<(), uc_error> {
		self.reg_write(reg, value as u64)
	}

	fn set_reg_u16(&mut self, reg: RegisterX86, value: u16) -> Result<(), uc_error> {
		self.reg_write(reg, value as u64)
	}

	fn flag(&self, flag: Flag) -> Result<bool, uc_error> {
		Ok(self.reg_read(RegisterX86::EFLAGS)? & flag.mask() != 0)
	}

	/// Updates one flag bit and leaves the rest of the flags register alone.
	fn set_flag(&mut self, flag: Flag, value: bool) -> Result<(), uc_error> {
		let mut flags = self.reg_read(RegisterX86::EFLAGS)?;
		if value {
			flags |= flag.mask();
		} else {
			flags &= !flag.mask();
		}
		self.reg_write(RegisterX86::EFLAGS, flags)
	}
}
