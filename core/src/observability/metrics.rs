use std::mem;

use hookgate_protocol::HookMetrics;
use tracing::debug;

use super::log_writer::MetricsLogWriter;
use crate::error::MetricsLogError;

/// In-memory metrics buffer, flushed to the sink in batches.
#[derive(Debug)]
pub struct MetricsRecorder {
    buffer: Vec<HookMetrics>,
    flush_threshold: usize,
    writer: MetricsLogWriter,
}

impl MetricsRecorder {
    pub fn new(writer: MetricsLogWriter, flush_threshold: usize) -> Self {
        let flush_threshold = flush_threshold.max(1);
        Self {
            buffer: Vec::with_capacity(flush_threshold),
            flush_threshold,
            writer,
        }
    }

    /// Buffers `metrics`, flushing once the threshold is reached.
    pub async fn record(&mut self, metrics: HookMetrics) -> Result<(), MetricsLogError> {
        self.buffer.push(metrics);
        if self.buffer.len() >= self.flush_threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Writes out everything buffered. A failed batch is dropped.
    pub async fn flush(&mut self) -> Result<usize, MetricsLogError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let batch = mem::take(&mut self.buffer);
        self.writer.append_batch(&batch).await?;
        debug!(records = batch.len(), path = %self.writer.path().display(), "flushed hook metrics");
        Ok(batch.len())
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
