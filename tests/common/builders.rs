//! Test data builders for producer dumps

use sidcap_rs::RecordLayout;

/// Builder for one producer record line
pub struct RecordLineBuilder {
    clock_delta: u32,
    irq_delta: u32,
    nmi_delta: u32,
    chip: u8,
    register: u8,
    value: u8,
}

impl RecordLineBuilder {
    pub fn new(register: u8, value: u8) -> Self {
        Self {
            clock_delta: 0,
            irq_delta: 0,
            nmi_delta: 0,
            chip: 0,
            register,
            value,
        }
    }

    pub fn clock(mut self, clock_delta: u32) -> Self {
        self.clock_delta = clock_delta;
        self
    }

    pub fn irq(mut self, irq_delta: u32) -> Self {
        self.irq_delta = irq_delta;
        self
    }

    pub fn nmi(mut self, nmi_delta: u32) -> Self {
        self.nmi_delta = nmi_delta;
        self
    }

    pub fn chip(mut self, chip: u8) -> Self {
        self.chip = chip;
        self
    }

    /// Render the line, newline included
    pub fn build(&self, layout: RecordLayout) -> String {
        match layout {
            RecordLayout::Full => format!(
                "{} {} {} {} {} {}\n",
                self.clock_delta,
                self.irq_delta,
                self.nmi_delta,
                self.chip,
                self.register,
                self.value
            ),
            RecordLayout::Legacy => format!(
                "{} {} {}\n",
                self.clock_delta,
                u32::from(self.chip) * 32 + u32::from(self.register),
                self.value
            ),
        }
    }
}

/// Builder for a whole dump
#[derive(Default)]
pub struct DumpBuilder {
    text: String,
}

impl DumpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, line: RecordLineBuilder, layout: RecordLayout) -> Self {
        self.text.push_str(&line.build(layout));
        self
    }

    /// Append a raw line as-is, a newline is added
    pub fn raw(mut self, line: &str) -> Self {
        self.text.push_str(line);
        self.text.push('\n');
        self
    }

    pub fn build(self) -> String {
        self.text
    }
}

/// Split `bytes` into chunks of `size`
pub fn chunked(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_line_builder() {
        let line = RecordLineBuilder::new(24, 15).clock(5).irq(2).chip(1);
        assert_eq!(line.build(RecordLayout::Full), "5 2 0 1 24 15\n");
        assert_eq!(line.build(RecordLayout::Legacy), "5 56 15\n");
    }
}
