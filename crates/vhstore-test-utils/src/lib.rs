//! Testing utilities for the vhstore workspace
//!
//! Shared fixtures, an in-memory object graph and tracing helpers.

#![allow(missing_docs)]

mod fixtures;
mod graph;

pub use fixtures::{
    current_store, qualified, virtual_host, BindingModelStore, LegacyStore, VIRTUAL_HOST_NAME,
};
pub use graph::{TestObject, TestVirtualHostNode};

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly fmt subscriber honouring `RUST_LOG`
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Default)]
struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

struct CaptureWriterGuard {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriterGuard {
            buffer: self.buffer.clone(),
        }
    }
}

impl Write for CaptureWriterGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return its log output
pub fn capture_logs<T>(max_level: Level, f: impl FnOnce() -> T) -> (T, String) {
    let writer = CaptureWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_max_level(max_level)
        .with_ansi(false)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let output = String::from_utf8_lossy(&writer.buffer.lock()).into_owned();
    (result, output)
}
