//! Streamed `document.write` reconstruction.

pub mod markers;
pub mod state;
pub mod streamer;

pub use state::DocumentWriterState;
pub use state::WriterPhase;
pub use streamer::DocumentWriteStreamer;
pub use streamer::StreamerConfig;
