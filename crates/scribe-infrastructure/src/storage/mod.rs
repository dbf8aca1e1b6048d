//! Storage layer: atomic file operations, payload classification, the
//! segmented index view, and the coalescing index writer.

pub mod atomic_file;
mod index_view;
mod index_writer;
mod payload;

pub use index_view::IndexView;
pub use index_writer::IndexWriter;
pub use payload::StoredPayload;
