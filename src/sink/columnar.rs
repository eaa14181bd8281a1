//! Parquet output
//!
//! Events are buffered into column vectors and flushed as one record batch
//! per [`BATCH_ROWS`] events, so memory stays bounded on long captures.
//!
//! | column       | type          | notes                           |
//! |--------------|---------------|---------------------------------|
//! | `clock`      | UInt32        | absolute or delta               |
//! | `irq`        | UInt32 (null) | null for legacy captures        |
//! | `nmi`        | UInt32 (null) | null for legacy captures        |
//! | `chip_index` | UInt8         |                                 |
//! | `register`   | UInt8         |                                 |
//! | `value`      | UInt8         | masked                          |

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, UInt32Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use super::{sink_closed, EventSink, SinkReport};
use crate::config::OutputFormat;
use crate::error::{CaptureError, Result};
use crate::types::{ClockMode, CompactedEvent};

/// Events per record batch
pub const BATCH_ROWS: usize = 64 * 1024;

/// Schema of the event table
pub fn event_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("clock", DataType::UInt32, false),
        Field::new("irq", DataType::UInt32, true),
        Field::new("nmi", DataType::UInt32, true),
        Field::new("chip_index", DataType::UInt8, false),
        Field::new("register", DataType::UInt8, false),
        Field::new("value", DataType::UInt8, false),
    ]))
}

fn writer_properties(level: i32, clock_mode: ClockMode) -> Result<WriterProperties> {
    let metadata = vec![
        KeyValue {
            key: "created_by".to_string(),
            value: Some(concat!("sidcap-rs ", env!("CARGO_PKG_VERSION")).to_string()),
        },
        KeyValue {
            key: "clock_mode".to_string(),
            value: Some(clock_mode.to_string()),
        },
    ];
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(level)?))
        .set_key_value_metadata(Some(metadata))
        .build())
}

/// Column buffers for the batch being assembled
#[derive(Debug, Default)]
struct Columns {
    clock: Vec<u32>,
    irq: Vec<Option<u32>>,
    nmi: Vec<Option<u32>>,
    chip_index: Vec<u8>,
    register: Vec<u8>,
    value: Vec<u8>,
}

impl Columns {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            clock: Vec::with_capacity(capacity),
            irq: Vec::with_capacity(capacity),
            nmi: Vec::with_capacity(capacity),
            chip_index: Vec::with_capacity(capacity),
            register: Vec::with_capacity(capacity),
            value: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, event: &CompactedEvent) {
        self.clock.push(event.clock);
        self.irq.push(event.irq);
        self.nmi.push(event.nmi);
        self.chip_index.push(event.chip_index);
        self.register.push(event.register);
        self.value.push(event.value);
    }

    fn len(&self) -> usize {
        self.clock.len()
    }

    fn is_empty(&self) -> bool {
        self.clock.is_empty()
    }

    /// Move the buffered rows into a record batch
    fn take_batch(&mut self, schema: &Arc<Schema>) -> Result<RecordBatch> {
        let columns = std::mem::replace(self, Self::with_capacity(BATCH_ROWS));
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from(columns.clock)),
            Arc::new(UInt32Array::from(columns.irq)),
            Arc::new(UInt32Array::from(columns.nmi)),
            Arc::new(UInt8Array::from(columns.chip_index)),
            Arc::new(UInt8Array::from(columns.register)),
            Arc::new(UInt8Array::from(columns.value)),
        ];
        Ok(RecordBatch::try_new(schema.clone(), arrays)?)
    }
}

/// Writes events as zstd-compressed Parquet columns
pub struct ColumnarSink {
    writer: Option<ArrowWriter<File>>,
    schema: Arc<Schema>,
    columns: Columns,
    path: PathBuf,
    events_written: u64,
    report: Option<SinkReport>,
}

impl ColumnarSink {
    /// Create (or truncate) the output file at `path`
    pub fn create(path: impl AsRef<Path>, level: i32, clock_mode: ClockMode) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| CaptureError::io("create", path, e))?;
        let schema = event_schema();
        let props = writer_properties(level, clock_mode)?;
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        Ok(Self {
            writer: Some(writer),
            schema,
            columns: Columns::with_capacity(BATCH_ROWS),
            path: path.to_path_buf(),
            events_written: 0,
            report: None,
        })
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.columns.is_empty() {
            return Ok(());
        }
        let batch = self.columns.take_batch(&self.schema)?;
        let writer = self.writer.as_mut().ok_or_else(sink_closed)?;
        writer.write(&batch)?;
        Ok(())
    }
}

impl EventSink for ColumnarSink {
    fn write_event(&mut self, event: &CompactedEvent) -> Result<()> {
        if self.writer.is_none() {
            return Err(sink_closed());
        }
        self.columns.push(event);
        self.events_written += 1;
        if self.columns.len() >= BATCH_ROWS {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn events_written(&self) -> u64 {
        self.events_written
    }

    fn finish(&mut self) -> Result<SinkReport> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }
        self.flush_batch()?;
        let writer = self.writer.take().ok_or_else(sink_closed)?;
        writer.close()?;

        let bytes_written = std::fs::metadata(&self.path)
            .map_err(|e| CaptureError::io("stat", &self.path, e))?
            .len();
        let report = SinkReport {
            path: Some(self.path.clone()),
            format: OutputFormat::Parquet,
            events_written: self.events_written,
            bytes_written,
        };
        tracing::debug!(
            "Parquet sink finished: {} events, {} bytes",
            report.events_written,
            report.bytes_written
        );
        self.report = Some(report.clone());
        Ok(report)
    }
}

impl Drop for ColumnarSink {
    fn drop(&mut self) {
        if self.writer.is_none() {
            return;
        }
        // Unfinished sink: write the footer so the rows accepted so far are readable
        let result = self.flush_batch().and_then(|_| match self.writer.take() {
            Some(writer) => writer.close().map(|_| ()).map_err(CaptureError::from),
            None => Ok(()),
        });
        match result {
            Ok(()) => tracing::warn!(
                "Parquet sink dropped without finish, finalized after {} events",
                self.events_written
            ),
            Err(e) => tracing::error!("Failed to finalize parquet sink on drop: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn read_batches(path: &Path) -> Vec<RecordBatch> {
        let file = File::open(path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        reader.map(|b| b.unwrap()).collect()
    }

    fn event(clock: u32, irq: Option<u32>) -> CompactedEvent {
        CompactedEvent {
            clock,
            irq,
            nmi: irq,
            chip_index: 1,
            register: 4,
            value: 65,
        }
    }

    #[test]
    fn test_columns_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dump.parquet");
        let mut sink = ColumnarSink::create(&path, 3, ClockMode::Absolute).unwrap();
        sink.write_event(&event(10, Some(4))).unwrap();
        sink.write_event(&event(20, None)).unwrap();
        let report = sink.finish().unwrap();
        assert_eq!(report.events_written, 2);
        assert_eq!(report.format, OutputFormat::Parquet);

        let batches = read_batches(&path);
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.schema().fields().len(), 6);

        let clock = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .unwrap();
        assert_eq!(clock.values().to_vec(), vec![10, 20]);

        let irq = batch
            .column(1)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .unwrap();
        assert_eq!(irq.value(0), 4);
        assert!(irq.is_null(1));

        let value = batch
            .column(5)
            .as_any()
            .downcast_ref::<UInt8Array>()
            .unwrap();
        assert_eq!(value.value(1), 65);
    }

    #[test]
    fn test_metadata_records_clock_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delta.dump.parquet");
        let mut sink = ColumnarSink::create(&path, 3, ClockMode::Delta).unwrap();
        sink.finish().unwrap();

        let file = File::open(&path).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        let kv = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .cloned()
            .unwrap_or_default();
        assert!(kv
            .iter()
            .any(|e| e.key == "clock_mode" && e.value.as_deref() == Some("delta")));
    }

    #[test]
    fn test_batches_split_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.dump.parquet");
        let mut sink = ColumnarSink::create(&path, 1, ClockMode::Absolute).unwrap();
        for clock in 0..(BATCH_ROWS as u32 + 10) {
            sink.write_event(&event(clock, Some(0))).unwrap();
        }
        sink.finish().unwrap();

        let rows: usize = read_batches(&path).iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, BATCH_ROWS + 10);
    }

    #[test]
    fn test_drop_writes_footer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.dump.parquet");
        {
            let mut sink = ColumnarSink::create(&path, 3, ClockMode::Absolute).unwrap();
            sink.write_event(&event(1, Some(0))).unwrap();
        }
        let rows: usize = read_batches(&path).iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.dump.parquet");
        assert!(ColumnarSink::create(&path, 1000, ClockMode::Absolute).is_err());
    }
}
