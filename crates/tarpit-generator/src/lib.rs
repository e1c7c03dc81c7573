//! Tarpit Generator -- synthetic document content sources (spec.md
//! section 4.2).
//!
//! A `ContentSource` is handed to a staller (`tarpit-stall`) as the
//! producer half of the byte-paced drip: `start()` once, then
//! `generate_chunk()` repeatedly with `chunk_separator()` written
//! between chunks, then `end()` once the staller decides to stop.
//! Every source renders from the same random [`value::Value`] tree so
//! adding a format means adding an encoder, not a new generator.

pub mod format;
pub mod registry;
pub mod secrets;
pub mod value;

use std::sync::Arc;

use tarpit_rng::SeededRng;
use value::Value;

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("failed to encode synthetic document: {0}")]
    Encode(String),
}

/// Reports generated secret-shaped bait back to telemetry.
/// `tarpit-telemetry` implements this; `tarpit-generator` only needs
/// the contract, mirroring `tarpit_stall::WastedTimeSink`.
pub trait SecretsSink: Send + Sync {
    fn report_secrets_generated(&self, count: usize);
}

pub struct NullSecretsSink;
impl SecretsSink for NullSecretsSink {
    fn report_secrets_generated(&self, _count: usize) {}
}

/// Mirrors the original generator interface: `Start`/`Generate`/
/// `GenerateChunk`/`ChunkSeparator`/`End`, each returning the bytes to
/// write next. `generate()` produces one complete standalone document
/// (used for single-shot responses); `generate_chunk()` is called
/// repeatedly by a staller that wants an open-ended stream and does
/// not care about document boundaries.
pub trait ContentSource: Send {
    fn start(&mut self) -> Vec<u8>;
    fn generate(&mut self) -> Vec<u8>;
    fn generate_chunk(&mut self) -> Vec<u8>;
    fn chunk_separator(&self) -> Vec<u8>;
    fn end(&mut self) -> Vec<u8>;
    fn content_type(&self) -> &'static str;
}

/// How deep/wide generated documents are allowed to grow and how many
/// secret-shaped fields get salted in. Kept small; a tarpit response
/// needs to look plausible, not be a realistic config file.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorTuning {
    pub max_depth: u32,
    pub max_fields: usize,
    pub secrets_per_document: usize,
}

impl Default for GeneratorTuning {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_fields: 6,
            secrets_per_document: 5,
        }
    }
}

/// A content source that renders freshly generated documents through a
/// chosen [`format::Format`]. One instance per connection; its `rng`
/// is exclusively owned so the stream it produces is reproducible
/// given the seed it was built with.
pub struct DocumentSource {
    rng: SeededRng,
    format: format::Format,
    tuning: GeneratorTuning,
    secrets_sink: Arc<dyn SecretsSink>,
}

impl DocumentSource {
    pub fn new(rng: SeededRng, format: format::Format, tuning: GeneratorTuning) -> Self {
        Self { rng, format, tuning, secrets_sink: Arc::new(NullSecretsSink) }
    }

    /// Attaches a telemetry sink so every document this source renders
    /// reports its injected secret count. Builder-style so existing
    /// `new()` call sites that don't care about telemetry are unaffected.
    pub fn with_secrets_sink(mut self, sink: Arc<dyn SecretsSink>) -> Self {
        self.secrets_sink = sink;
        self
    }

    fn next_document(&mut self) -> Value {
        let mut doc = value::random_document(&mut self.rng, self.tuning.max_depth, self.tuning.max_fields);
        secrets::inject_secrets(&mut self.rng, &mut doc, self.tuning.secrets_per_document);
        self.secrets_sink.report_secrets_generated(self.tuning.secrets_per_document);
        doc
    }
}

impl ContentSource for DocumentSource {
    fn start(&mut self) -> Vec<u8> {
        self.format.start()
    }

    fn generate(&mut self) -> Vec<u8> {
        if self.format.is_tabular() {
            let row = format::tabular_row(&mut self.rng);
            return self.format.encode_row(&row).unwrap_or_default();
        }
        let doc = self.next_document();
        self.format.encode(&doc).unwrap_or_default()
    }

    fn generate_chunk(&mut self) -> Vec<u8> {
        self.generate()
    }

    fn chunk_separator(&self) -> Vec<u8> {
        self.format.delimiter()
    }

    fn end(&mut self) -> Vec<u8> {
        self.format.end()
    }

    fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_source_produces_nonempty_chunks_for_every_format() {
        for fmt in format::Format::ALL {
            let mut src = DocumentSource::new(
                SeededRng::from_seed(3),
                *fmt,
                GeneratorTuning::default(),
            );
            let _ = src.start();
            let chunk = src.generate_chunk();
            assert!(!chunk.is_empty(), "format {fmt:?} produced an empty chunk");
            let _ = src.end();
        }
    }
}
