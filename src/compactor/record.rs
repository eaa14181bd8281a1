//! Text record parsing
//!
//! Each producer line is one of:
//!
//! - a register write in the configured [`RecordLayout`],
//! - an annotation (any line containing `:`), which is ignored,
//! - anything else, which is malformed and skipped by the compactor.

use crate::types::{RawRecord, RecordLayout};
use std::fmt;

/// Why a line could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// Wrong number of whitespace-separated fields
    FieldCount { expected: usize, found: usize },
    /// A field is not an integer in range
    BadField { index: usize },
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Malformed::FieldCount { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
            Malformed::BadField { index } => write!(f, "field {} is not a valid integer", index),
        }
    }
}

/// Result of parsing one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedLine {
    /// A register write
    Record(RawRecord),
    /// An out-of-band annotation line
    Annotation,
    /// A line that is neither
    Malformed(Malformed),
}

/// Whether a line is an out-of-band annotation
#[inline]
pub fn is_annotation(line: &str) -> bool {
    line.contains(':')
}

/// Parse one line in the given layout
pub fn parse_line(line: &str, layout: RecordLayout) -> ParsedLine {
    if is_annotation(line) {
        return ParsedLine::Annotation;
    }

    let expected = layout.field_count();
    let mut fields = [""; 6];
    let mut found = 0;
    for field in line.split_ascii_whitespace() {
        if found < expected {
            fields[found] = field;
        }
        found += 1;
    }
    if found != expected {
        return ParsedLine::Malformed(Malformed::FieldCount { expected, found });
    }

    let parsed = match layout {
        RecordLayout::Full => parse_full(&fields),
        RecordLayout::Legacy => parse_legacy(&fields),
    };
    match parsed {
        Ok(record) => ParsedLine::Record(record),
        Err(reason) => ParsedLine::Malformed(reason),
    }
}

fn field<T: std::str::FromStr>(fields: &[&str], index: usize) -> Result<T, Malformed> {
    fields[index]
        .parse()
        .map_err(|_| Malformed::BadField { index })
}

fn parse_full(fields: &[&str]) -> Result<RawRecord, Malformed> {
    Ok(RawRecord {
        clock_delta: field(fields, 0)?,
        irq_delta: Some(field(fields, 1)?),
        nmi_delta: Some(field(fields, 2)?),
        chip_index: field(fields, 3)?,
        register: field(fields, 4)?,
        value: field(fields, 5)?,
    })
}

fn parse_legacy(fields: &[&str]) -> Result<RawRecord, Malformed> {
    let clock_delta = field(fields, 0)?;
    let address: u32 = field(fields, 1)?;
    let value = field(fields, 2)?;
    RawRecord::from_address(clock_delta, address, value).ok_or(Malformed::BadField { index: 1 })
}
