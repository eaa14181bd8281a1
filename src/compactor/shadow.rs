//! Shadow copy of the last emitted value per chip register

use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Pack a `(chip, register)` pair into one lookup key
#[inline]
pub fn shadow_key(chip_index: u8, register: u8) -> u16 {
    (u16::from(chip_index) << 8) | u16::from(register)
}

/// Last emitted masked value per `(chip, register)`
///
/// Grows as new keys are observed and is dropped with its session.
#[derive(Debug, Default, Clone)]
pub struct ShadowState {
    values: HashMap<u16, u8>,
}

impl ShadowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last emitted value for a register, if any
    pub fn get(&self, chip_index: u8, register: u8) -> Option<u8> {
        self.values.get(&shadow_key(chip_index, register)).copied()
    }

    /// Record `value` for a register
    ///
    /// Returns `true` if the value differs from the shadow copy (or the
    /// register was never seen), in which case the copy is updated.
    pub fn update(&mut self, chip_index: u8, register: u8, value: u8) -> bool {
        match self.values.entry(shadow_key(chip_index, register)) {
            Entry::Occupied(mut e) => {
                if *e.get() == value {
                    false
                } else {
                    e.insert(value);
                    true
                }
            }
            Entry::Vacant(e) => {
                e.insert(value);
                true
            }
        }
    }

    /// Number of registers observed
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
