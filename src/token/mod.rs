//! Token packing (component I): turns `C3Problem`s into bounded token records a seq2seq model
//! can train or evaluate on. See `packer` for the pipeline, `vocab` for id assignment, and
//! `cache` for the content-hash keyed FIFO caches used to avoid re-tokenizing shared bodies.

pub mod cache;
pub mod packer;
pub mod vocab;

pub use cache::FifoCache;
pub use packer::{pack_problem, TkC3Problem};
pub use vocab::{TokenId, TokenVocab};
