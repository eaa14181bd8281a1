//! Core data types for sidcap-rs
//!
//! This module defines the record and event types that flow through the
//! capture pipeline:
//!
//! - [`RawRecord`] - One parsed input line, before masking and deduplication
//! - [`CompactedEvent`] - One emitted register write after compaction
//! - [`RecordLayout`] - Which input field layout the producer speaks
//! - [`ClockMode`] - How emitted events carry timing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width of one chip's register window in the flat legacy address space
pub const CHIP_ADDRESS_SPAN: u32 = 32;

/// Default highest register index kept by the compactor
pub const DEFAULT_MAX_REGISTER: u8 = 24;

/// Field layout of the producer's text records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLayout {
    /// `clock_delta irq_delta nmi_delta chip register value`
    #[default]
    Full,
    /// `clock_delta address value`, chip and register derived from `address`
    Legacy,
}

impl RecordLayout {
    /// Number of whitespace-separated fields in one record
    pub fn field_count(&self) -> usize {
        match self {
            RecordLayout::Full => 6,
            RecordLayout::Legacy => 3,
        }
    }

    /// Whether records carry irq/nmi markers
    pub fn has_interrupt_markers(&self) -> bool {
        matches!(self, RecordLayout::Full)
    }
}

impl fmt::Display for RecordLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordLayout::Full => write!(f, "full"),
            RecordLayout::Legacy => write!(f, "legacy"),
        }
    }
}

impl FromStr for RecordLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(RecordLayout::Full),
            "legacy" => Ok(RecordLayout::Legacy),
            other => Err(format!("unknown record layout '{}' (expected full or legacy)", other)),
        }
    }
}

/// Timing representation of emitted events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Absolute running clock
    #[default]
    Absolute,
    /// Cycles since the previous emitted event
    Delta,
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockMode::Absolute => write!(f, "absolute"),
            ClockMode::Delta => write!(f, "delta"),
        }
    }
}

impl FromStr for ClockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "absolute" => Ok(ClockMode::Absolute),
            "delta" => Ok(ClockMode::Delta),
            other => Err(format!("unknown clock mode '{}' (expected absolute or delta)", other)),
        }
    }
}

/// One parsed input record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    /// Cycles since the previous record
    pub clock_delta: u32,
    /// Cycles back from this record to the latest IRQ
    pub irq_delta: Option<u32>,
    /// Cycles back from this record to the latest NMI
    pub nmi_delta: Option<u32>,
    /// Target chip instance
    pub chip_index: u8,
    /// Register offset within the chip
    pub register: u8,
    /// Written byte, before masking
    pub value: u8,
}

impl RawRecord {
    /// Build a record from a flat legacy address
    ///
    /// Returns `None` if the derived chip index does not fit in a `u8`.
    pub fn from_address(clock_delta: u32, address: u32, value: u8) -> Option<Self> {
        let chip_index = u8::try_from(address / CHIP_ADDRESS_SPAN).ok()?;
        // Always < 32
        let register = (address % CHIP_ADDRESS_SPAN) as u8;
        Some(Self {
            clock_delta,
            irq_delta: None,
            nmi_delta: None,
            chip_index,
            register,
            value,
        })
    }
}

/// One register write that survived compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactedEvent {
    /// Absolute clock or delta since the previous emitted event
    pub clock: u32,
    /// IRQ marker (absolute, or distance back from this event in delta mode)
    pub irq: Option<u32>,
    /// NMI marker (absolute, or distance back from this event in delta mode)
    pub nmi: Option<u32>,
    /// Target chip instance
    pub chip_index: u8,
    /// Register offset within the chip
    pub register: u8,
    /// Masked value
    pub value: u8,
}

impl CompactedEvent {
    /// Flat legacy address of this event's register
    pub fn address(&self) -> u32 {
        u32::from(self.chip_index) * CHIP_ADDRESS_SPAN + u32::from(self.register)
    }
}
