//! Serializer benchmark
//!
//! Times two ways of turning the same fixed-shape record into bytes:
//! - reflective: serde derive + bincode, writing into a growable stream
//! - hand-coded: the crate's own `DataWriter`, returning a byte buffer
//!
//! Cost only. The benchmark never checks that either strategy round-trips
//! the payload; adding that would change what is being measured.

use std::hint::black_box;
use std::io;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::protocol::DataWriter;

/// The fixed test record. Built once, serialized repeatedly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePayload {
    pub name: String,
    pub ratio: f32,
    pub numbers: Vec<i32>,
}

impl SamplePayload {
    /// The canonical demo record.
    pub fn demo() -> Self {
        Self {
            name: "TEST".to_string(),
            ratio: 0.3,
            numbers: vec![5, 6, 7],
        }
    }

    /// Hand-coded encoding: length-prefixed string, f32, i32 sequence.
    #[inline]
    pub fn write_to(&self, w: &mut DataWriter) {
        w.put_str(&self.name);
        w.put_f32(self.ratio);
        w.put_i32_slice(&self.numbers);
    }
}

/// Elapsed wall time per strategy for one run.
#[derive(Debug, Clone, Copy)]
pub struct BenchReport {
    pub iterations: u32,
    pub bincode_elapsed: Duration,
    pub writer_elapsed: Duration,
}

impl BenchReport {
    pub fn print(&self) {
        println!(
            "bincode time:    {} ms ({} iterations)",
            self.bincode_elapsed.as_millis(),
            self.iterations
        );
        println!(
            "DataWriter time: {} ms ({} iterations)",
            self.writer_elapsed.as_millis(),
            self.iterations
        );
    }
}

/// Times both strategies against one payload.
///
/// Output accumulates in a shared sink that grows across iterations within
/// one `run` call; the sink is reset at the start of every call, so a runner
/// can be reused.
pub struct BenchmarkRunner {
    sink: Vec<u8>,
    writer: DataWriter,
}

impl BenchmarkRunner {
    pub fn new() -> Self {
        Self {
            sink: Vec::new(),
            writer: DataWriter::new(),
        }
    }

    /// Bytes accumulated by the last `run` call.
    pub fn sink_len(&self) -> usize {
        self.sink.len()
    }

    /// Warm up, then serialize `payload` `iterations` times per strategy,
    /// timing each strategy with a monotonic clock. Order independent of any
    /// session state.
    pub fn run(
        &mut self,
        payload: &SamplePayload,
        iterations: u32,
        warmup_iterations: u32,
    ) -> io::Result<BenchReport> {
        self.sink.clear();
        warm_up(warmup_iterations);

        let start = Instant::now();
        for _ in 0..iterations {
            bincode::serialize_into(&mut self.sink, payload)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        }
        let bincode_elapsed = start.elapsed();

        let start = Instant::now();
        for _ in 0..iterations {
            self.writer.reset();
            payload.write_to(&mut self.writer);
            self.sink.extend_from_slice(self.writer.as_bytes());
        }
        let writer_elapsed = start.elapsed();

        Ok(BenchReport {
            iterations,
            bincode_elapsed,
            writer_elapsed,
        })
    }
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed-form numeric loop that only burns cycles, run before timing to
/// settle caches and branch predictors.
fn warm_up(iterations: u32) {
    let mut acc = 0.0f64;
    for i in 0..iterations {
        acc += (i as f64).sin();
    }
    black_box(acc);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DataReader;

    /// Encoded size of one payload under the hand-coded strategy.
    fn writer_size(payload: &SamplePayload) -> usize {
        let mut w = DataWriter::new();
        payload.write_to(&mut w);
        w.len()
    }

    #[test]
    fn test_zero_iterations() {
        let mut runner = BenchmarkRunner::new();
        let report = runner.run(&SamplePayload::demo(), 0, 0).unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(runner.sink_len(), 0);
    }

    #[test]
    fn test_exact_call_counts_via_sink_growth() {
        let payload = SamplePayload::demo();
        let bincode_size = bincode::serialized_size(&payload).unwrap() as usize;
        let writer_size = writer_size(&payload);

        let mut runner = BenchmarkRunner::new();
        let iterations = 1000u32;
        runner.run(&payload, iterations, 0).unwrap();
        assert_eq!(
            runner.sink_len(),
            iterations as usize * (bincode_size + writer_size)
        );
    }

    #[test]
    fn test_sink_reset_between_runs() {
        let payload = SamplePayload::demo();
        let mut runner = BenchmarkRunner::new();
        runner.run(&payload, 100, 0).unwrap();
        let first = runner.sink_len();
        runner.run(&payload, 100, 0).unwrap();
        assert_eq!(runner.sink_len(), first);
    }

    #[test]
    fn test_demo_payload_shape() {
        let payload = SamplePayload::demo();
        assert_eq!(payload.name, "TEST");
        assert_eq!(payload.ratio, 0.3);
        assert_eq!(payload.numbers, vec![5, 6, 7]);
    }

    #[test]
    fn test_handcoded_layout() {
        // layout check only; the benchmark itself never decodes
        let mut w = DataWriter::new();
        SamplePayload::demo().write_to(&mut w);

        let mut r = DataReader::new(w.as_bytes());
        assert_eq!(r.get_str(100).as_deref(), Some("TEST"));
        assert_eq!(r.get_f32(), Some(0.3));
        assert_eq!(r.get_i32_slice(), Some(vec![5, 6, 7]));
    }
}
