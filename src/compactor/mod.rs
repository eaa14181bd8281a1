//! Record compaction
//!
//! The [`Compactor`] turns producer lines into the minimal sequence of
//! register writes that reproduces the same observable chip state:
//!
//! ```text
//! line ──► parse ──► clock += delta ──► register filter ──► mask ──► dedup ──► CompactedEvent
//!            │                                │                        │
//!            └─ annotation / malformed        └─ filtered              └─ duplicate
//! ```
//!
//! # Timing
//!
//! The running clock advances for every parsed record, including records that
//! are later filtered or deduplicated, so later events keep correct timing.
//! In [`ClockMode::Delta`] the emitted clock is the distance to the previous
//! *emitted* event; suppressed records never move that baseline.
//!
//! Emitted clocks are 32 bits wide. A record whose emitted clock or marker
//! would not fit is rejected with [`CaptureError::ClockOverflow`] and leaves
//! the compactor state untouched.
//!
//! # Ownership
//!
//! The shadow state and clock belong to one compactor and one session. Chips
//! are independent, so a sharded capture would give each shard its own
//! compactor.

pub mod mask;
pub mod record;
pub mod shadow;

pub use mask::{RegisterWidthTable, SID_REGISTER_WIDTHS};
pub use record::{parse_line, Malformed, ParsedLine};
pub use shadow::ShadowState;

use serde::Serialize;

use crate::config::CompactionSettings;
use crate::error::{CaptureError, Result};
use crate::types::{ClockMode, CompactedEvent, RawRecord, RecordLayout};

/// What happened to one input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// The record changed chip state and was emitted
    Emitted(CompactedEvent),
    /// The masked value matched the shadow copy
    Duplicate,
    /// The register is above the configured maximum
    Filtered,
    /// Out-of-band annotation line
    Annotation,
    /// Unparsable line
    Malformed(Malformed),
}

impl LineOutcome {
    /// The emitted event, if any
    pub fn event(&self) -> Option<&CompactedEvent> {
        match self {
            LineOutcome::Emitted(event) => Some(event),
            _ => None,
        }
    }
}

/// Counters kept by the compactor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompactorStats {
    /// Records parsed (annotations and malformed lines excluded)
    pub lines_in: u64,
    /// Events emitted
    pub lines_out: u64,
    /// Unparsable lines skipped
    pub malformed: u64,
    /// Records dropped because the masked value did not change
    pub duplicates: u64,
    /// Records dropped by the register limit
    pub filtered: u64,
    /// Annotation lines skipped
    pub annotations: u64,
    /// Sum of all parsed clock deltas
    pub running_clock: u64,
    /// Smallest absolute IRQ marker among emitted events
    pub irq_min: Option<u64>,
    /// Largest absolute IRQ marker among emitted events
    pub irq_max: Option<u64>,
}

/// Incremental deduplicating compactor for one capture session
#[derive(Debug)]
pub struct Compactor {
    layout: RecordLayout,
    clock_mode: ClockMode,
    max_register: Option<u8>,
    shadow: ShadowState,
    running_clock: u64,
    last_emitted_clock: u64,
    stats: CompactorStats,
}

impl Compactor {
    /// Create a compactor with the SID register widths
    pub fn new(settings: &CompactionSettings) -> Self {
        Self {
            layout: settings.layout,
            clock_mode: settings.clock_mode,
            max_register: settings.max_register,
            shadow: ShadowState::new(),
            running_clock: 0,
            last_emitted_clock: 0,
            stats: CompactorStats::default(),
        }
    }

    /// Parse and compact one line
    ///
    /// Only a clock overflow is an error; annotations and malformed lines are
    /// reported through the outcome.
    pub fn process_line(&mut self, line: &str) -> Result<LineOutcome> {
        match parse_line(line, self.layout) {
            ParsedLine::Record(record) => self.process_record(record),
            ParsedLine::Annotation => {
                self.stats.annotations += 1;
                Ok(LineOutcome::Annotation)
            }
            ParsedLine::Malformed(reason) => {
                self.stats.malformed += 1;
                tracing::trace!("Skipping malformed record {:?}: {}", line, reason);
                Ok(LineOutcome::Malformed(reason))
            }
        }
    }

    /// Compact an already parsed record
    pub fn process_record(&mut self, record: RawRecord) -> Result<LineOutcome> {
        let now = self.running_clock + u64::from(record.clock_delta);

        let outcome = if self.max_register.is_some_and(|max| record.register > max) {
            self.stats.filtered += 1;
            LineOutcome::Filtered
        } else {
            let value = SID_REGISTER_WIDTHS.apply(record.register, record.value);
            if self.shadow.get(record.chip_index, record.register) == Some(value) {
                self.stats.duplicates += 1;
                LineOutcome::Duplicate
            } else {
                let event = self.event_at(now, &record, value)?;
                self.shadow.update(record.chip_index, record.register, value);
                self.record_emission(now, &record);
                LineOutcome::Emitted(event)
            }
        };

        self.stats.lines_in += 1;
        self.running_clock = now;
        self.stats.running_clock = now;
        Ok(outcome)
    }

    /// Build the event emitted at absolute clock `now` without touching state
    fn event_at(&self, now: u64, record: &RawRecord, value: u8) -> Result<CompactedEvent> {
        let irq_at = record.irq_delta.map(|d| now.saturating_sub(u64::from(d)));
        let nmi_at = record.nmi_delta.map(|d| now.saturating_sub(u64::from(d)));

        let (clock, irq, nmi) = match self.clock_mode {
            ClockMode::Absolute => (
                self.narrow(now)?,
                irq_at.map(|t| self.narrow(t)).transpose()?,
                nmi_at.map(|t| self.narrow(t)).transpose()?,
            ),
            ClockMode::Delta => (
                self.narrow(now - self.last_emitted_clock)?,
                irq_at.map(|t| self.narrow(now - t)).transpose()?,
                nmi_at.map(|t| self.narrow(now - t)).transpose()?,
            ),
        };

        Ok(CompactedEvent {
            clock,
            irq,
            nmi,
            chip_index: record.chip_index,
            register: record.register,
            value,
        })
    }

    fn record_emission(&mut self, now: u64, record: &RawRecord) {
        if let Some(delta) = record.irq_delta {
            let irq = now.saturating_sub(u64::from(delta));
            self.stats.irq_min = Some(self.stats.irq_min.map_or(irq, |m| m.min(irq)));
            self.stats.irq_max = Some(self.stats.irq_max.map_or(irq, |m| m.max(irq)));
        }
        self.stats.lines_out += 1;
        self.last_emitted_clock = now;
    }

    /// Narrow a clock value to the event width
    fn narrow(&self, clock: u64) -> Result<u32> {
        u32::try_from(clock).map_err(|_| CaptureError::ClockOverflow {
            clock,
            record: self.stats.lines_in + 1,
        })
    }

    /// Sum of all clock deltas seen so far
    pub fn running_clock(&self) -> u64 {
        self.running_clock
    }

    /// Absolute clock of the last emitted event
    pub fn last_emitted_clock(&self) -> u64 {
        self.last_emitted_clock
    }

    /// Shadow copy of emitted register values
    pub fn shadow(&self) -> &ShadowState {
        &self.shadow
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn clock_mode(&self) -> ClockMode {
        self.clock_mode
    }

    pub fn stats(&self) -> CompactorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn settings(layout: RecordLayout, clock_mode: ClockMode) -> CompactionSettings {
        CompactionSettings {
            layout,
            clock_mode,
            ..Default::default()
        }
    }

    fn run(compactor: &mut Compactor, input: &str) -> Vec<CompactedEvent> {
        input
            .lines()
            .filter_map(|line| compactor.process_line(line).unwrap().event().copied())
            .collect()
    }

    fn event(clock: u32, chip_index: u8, register: u8, value: u8) -> CompactedEvent {
        CompactedEvent {
            clock,
            irq: Some(clock),
            nmi: Some(clock),
            chip_index,
            register,
            value,
        }
    }

    #[test]
    fn test_duplicate_write_is_dropped() {
        let mut compactor = Compactor::new(&CompactionSettings::default());
        let events = run(&mut compactor, "0 0 0 0 3 255\n0 0 0 0 3 255\n5 0 0 0 3 8\n");

        assert_eq!(events, vec![event(0, 0, 3, 15), event(5, 0, 3, 8)]);
        let stats = compactor.stats();
        assert_eq!(stats.lines_in, 3);
        assert_eq!(stats.lines_out, 2);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_register_above_limit_is_filtered() {
        let mut compactor = Compactor::new(&CompactionSettings::default());
        assert_eq!(compactor.process_line("4 0 0 0 30 1").unwrap(), LineOutcome::Filtered);
        assert_eq!(compactor.stats().filtered, 1);
        assert_eq!(compactor.stats().malformed, 0);
        // Clock still advances
        assert_eq!(compactor.running_clock(), 4);
        assert!(compactor.shadow().is_empty());
    }

    #[test]
    fn test_no_register_limit() {
        let mut compactor = Compactor::new(&CompactionSettings {
            max_register: None,
            ..Default::default()
        });
        assert!(compactor.process_line("0 0 0 0 30 1").unwrap().event().is_some());
    }

    #[test]
    fn test_malformed_line_leaves_state_untouched() {
        let mut compactor = Compactor::new(&CompactionSettings::default());
        compactor.process_line("10 0 0 0 4 1").unwrap();
        assert!(matches!(
            compactor.process_line("abc").unwrap(),
            LineOutcome::Malformed(_)
        ));
        assert_eq!(compactor.running_clock(), 10);
        assert_eq!(compactor.stats().lines_in, 1);
        assert_eq!(compactor.stats().malformed, 1);

        let events = run(&mut compactor, "2 0 0 0 4 2");
        assert_eq!(events, vec![event(12, 0, 4, 2)]);
    }

    #[test]
    fn test_annotation_not_counted() {
        let mut compactor = Compactor::new(&CompactionSettings::default());
        assert_eq!(compactor.process_line("tune: 1").unwrap(), LineOutcome::Annotation);
        let stats = compactor.stats();
        assert_eq!(stats.annotations, 1);
        assert_eq!(stats.malformed, 0);
        assert_eq!(stats.lines_in, 0);
    }

    #[test]
    fn test_delta_baseline_skips_duplicates() {
        let mut compactor = Compactor::new(&settings(RecordLayout::Full, ClockMode::Delta));
        let events = run(
            &mut compactor,
            "10 0 0 0 1 5\n20 0 0 0 1 5\n30 0 0 0 1 5\n5 0 0 0 1 6\n",
        );
        let clocks: Vec<u32> = events.iter().map(|e| e.clock).collect();
        assert_eq!(clocks, vec![10, 55]);
        assert_eq!(compactor.last_emitted_clock(), 65);
    }

    #[test]
    fn test_interrupt_markers_clamped() {
        let mut compactor = Compactor::new(&CompactionSettings::default());
        let events = run(&mut compactor, "100 30 500 0 4 1\n");
        assert_eq!(events[0].irq, Some(70));
        assert_eq!(events[0].nmi, Some(0));
        assert_eq!(compactor.stats().irq_min, Some(70));
        assert_eq!(compactor.stats().irq_max, Some(70));
    }

    #[test]
    fn test_interrupt_markers_in_delta_mode() {
        let mut compactor = Compactor::new(&settings(RecordLayout::Full, ClockMode::Delta));
        let events = run(&mut compactor, "100 30 500 0 4 1\n");
        assert_eq!(events[0].irq, Some(30));
        assert_eq!(events[0].nmi, Some(100));
    }

    #[test]
    fn test_legacy_layout() {
        let mut compactor = Compactor::new(&settings(RecordLayout::Legacy, ClockMode::Absolute));
        let events = run(&mut compactor, "7 35 255\n1 35 31\n1 3 255\n");
        assert_eq!(
            events,
            vec![
                CompactedEvent {
                    clock: 7,
                    irq: None,
                    nmi: None,
                    chip_index: 1,
                    register: 3,
                    value: 15,
                },
                CompactedEvent {
                    clock: 9,
                    irq: None,
                    nmi: None,
                    chip_index: 0,
                    register: 3,
                    value: 15,
                },
            ]
        );
        assert_eq!(compactor.stats().duplicates, 1);
    }

    #[test]
    fn test_absolute_clock_overflow_is_rejected() {
        let mut compactor = Compactor::new(&CompactionSettings::default());
        let first = compactor
            .process_line(&format!("{} 0 0 0 4 1", u32::MAX))
            .unwrap();
        assert_eq!(first.event().map(|e| e.clock), Some(u32::MAX));

        let err = compactor.process_line("100 0 0 0 4 2").unwrap_err();
        assert!(matches!(
            err,
            CaptureError::ClockOverflow { clock, record: 2 } if clock == u64::from(u32::MAX) + 100
        ));

        // The rejected record leaves no trace
        assert_eq!(compactor.running_clock(), u64::from(u32::MAX));
        assert_eq!(compactor.shadow().get(0, 4), Some(1));
        assert_eq!(compactor.stats().lines_in, 1);
        assert_eq!(compactor.stats().lines_out, 1);
        assert!(compactor.process_line("100 0 0 0 4 3").is_err());
    }

    #[test]
    fn test_overflow_only_applies_to_emitted_records() {
        let mut compactor = Compactor::new(&CompactionSettings::default());
        compactor
            .process_line(&format!("{} 0 0 0 4 1", u32::MAX))
            .unwrap();
        assert_eq!(
            compactor.process_line("100 0 0 0 4 1").unwrap(),
            LineOutcome::Duplicate
        );
        assert_eq!(
            compactor.process_line("1 0 0 0 30 1").unwrap(),
            LineOutcome::Filtered
        );
        assert_eq!(compactor.running_clock(), u64::from(u32::MAX) + 101);
    }

    #[test]
    fn test_delta_mode_runs_past_32_bit_clock() {
        let mut compactor = Compactor::new(&settings(RecordLayout::Full, ClockMode::Delta));
        let events = run(
            &mut compactor,
            &format!("{} 0 0 0 4 1\n100 50 0 0 4 2\n", u32::MAX),
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].clock, 100);
        assert_eq!(events[1].irq, Some(50));
        assert_eq!(compactor.stats().irq_max, Some(u64::from(u32::MAX) + 50));
    }

    #[test]
    fn test_empty_session() {
        let compactor = Compactor::new(&CompactionSettings::default());
        assert_eq!(compactor.stats(), CompactorStats::default());
    }

    proptest! {
        #[test]
        fn test_emissions_equal_masked_transitions(
            values in prop::collection::vec(any::<u8>(), 1..100),
            register in 0u8..=24,
        ) {
            let mut compactor = Compactor::new(&CompactionSettings::default());
            let mut emitted = 0usize;
            for v in &values {
                let line = format!("1 0 0 0 {} {}", register, v);
                if compactor.process_line(&line).unwrap().event().is_some() {
                    emitted += 1;
                }
            }

            let masked: Vec<u8> = values
                .iter()
                .map(|&v| SID_REGISTER_WIDTHS.apply(register, v))
                .collect();
            let transitions = 1 + masked.windows(2).filter(|w| w[0] != w[1]).count();
            prop_assert_eq!(emitted, transitions);
        }

        #[test]
        fn test_running_clock_is_sum_of_deltas(
            records in prop::collection::vec((0u32..10_000, 0u8..32, any::<u8>()), 0..100),
        ) {
            let mut compactor = Compactor::new(&CompactionSettings::default());
            let mut previous = 0;
            for (delta, register, value) in &records {
                let line = format!("{} 0 0 0 {} {}", delta, register, value);
                compactor.process_line(&line).unwrap();
                prop_assert!(compactor.running_clock() >= previous);
                previous = compactor.running_clock();
            }
            let sum: u64 = records.iter().map(|(d, _, _)| u64::from(*d)).sum();
            prop_assert_eq!(compactor.running_clock(), sum);
        }

        #[test]
        fn test_delta_sum_equals_last_emitted_clock(
            records in prop::collection::vec((0u32..10_000, 0u8..2, 0u8..8, 0u8..4), 1..100),
        ) {
            let mut absolute = Compactor::new(&settings(RecordLayout::Full, ClockMode::Absolute));
            let mut delta = Compactor::new(&settings(RecordLayout::Full, ClockMode::Delta));
            let mut last_absolute = None;
            let mut delta_sum = 0u64;

            for (d, chip, register, value) in &records {
                let line = format!("{} 0 0 {} {} {}", d, chip, register, value);
                if let Some(e) = absolute.process_line(&line).unwrap().event() {
                    last_absolute = Some(e.clock);
                }
                if let Some(e) = delta.process_line(&line).unwrap().event() {
                    delta_sum += u64::from(e.clock);
                }
            }

            prop_assert_eq!(last_absolute.map(u64::from).unwrap_or(0), delta_sum);
        }
    }
}
