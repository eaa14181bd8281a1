//! Register width table
//!
//! Some SID registers only use part of the written byte. Clearing the unused
//! bits before deduplication turns writes that differ only in dead bits into
//! duplicates.

/// Mask for registers that use all eight bits
pub const FULL_MASK: u8 = 0xFF;

/// Registers narrower than eight bits and the bits they keep
const NARROW_REGISTERS: &[(u8, u8)] = &[
    (3, 0x0F),  // v1 PWM high
    (10, 0x0F), // v2 PWM high
    (17, 0x0F), // v3 PWM high
    (21, 0x07), // filter cutoff low
    (23, 0xF7), // clear filter external
];

/// Static mapping from register offset to its significant bits
#[derive(Debug, Clone, Copy)]
pub struct RegisterWidthTable {
    masks: [u8; 256],
}

/// The SID register width table
pub static SID_REGISTER_WIDTHS: RegisterWidthTable = RegisterWidthTable::sid();

impl RegisterWidthTable {
    /// Build the SID table
    pub const fn sid() -> Self {
        let mut masks = [FULL_MASK; 256];
        let mut i = 0;
        while i < NARROW_REGISTERS.len() {
            let (register, mask) = NARROW_REGISTERS[i];
            masks[register as usize] = mask;
            i += 1;
        }
        Self { masks }
    }

    /// Significant bits of a register
    #[inline]
    pub fn mask_for(&self, register: u8) -> u8 {
        self.masks[register as usize]
    }

    /// Clear the unused bits of a value written to `register`
    #[inline]
    pub fn apply(&self, register: u8, value: u8) -> u8 {
        value & self.mask_for(register)
    }
}

impl Default for RegisterWidthTable {
    fn default() -> Self {
        Self::sid()
    }
}
