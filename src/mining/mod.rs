//! Transaction pooling for the next block

pub mod mempool;

pub use mempool::{Mempool, MempoolEntry, MempoolError};
