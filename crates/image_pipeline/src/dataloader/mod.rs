//! src/dataloader/mod.rs
//!
//! This module implements the `DataLoader`.
//!
//! The `DataLoader` coordinates a `Dataset`, a `Sampler` and stack collation
//! to turn labelled image files into `[N, 3, H, W]` batches, optionally on a
//! pool of worker threads.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌────────────────────┐
//!                 │ ImageFolderDataset │ (paths + TransformPipeline)
//!                 └─────────┬──────────┘
//!                           │ get_sample(index): decode + transform
//!                           ↓
//!                      ┌─────────┐
//!                      │ Sampler │ (sequential or shuffled per epoch)
//!                      └────┬────┘
//!                           │ batches of indices
//!                           ↓
//!                    ┌──────────────┐
//!                    │  DataLoader  │ ←───── DataLoaderConfig
//!                    └──────┬───────┘
//!                           │ batch k → worker k % n
//!                           ↓
//!                     [Worker Threads] (optional)
//!                           │
//!                           ↓
//!                     ┌────────────┐
//!                     │ ImageBatch │ (images [N,3,H,W], labels [N])
//!                     └────────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dataloader/
//! ├── mod.rs        # Public API exports + architecture docs
//! ├── config.rs     # DataLoaderConfig and builder
//! ├── loader.rs     # DataLoader struct, constructor, worker spawning
//! ├── iterator.rs   # DataLoaderIter (single- and multi-threaded)
//! └── workers/
//!     ├── mod.rs    # BatchTask and batch loading
//!     └── pool.rs   # Per-worker channel thread pool
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! let config = DataLoaderConfig::builder()
//!     .batch_size(32)
//!     .num_workers(4)
//!     .shuffle(true)
//!     .seed(42)
//!     .build();
//!
//! let dataloader = DataLoader::new(dataset, config)?;
//! for batch in dataloader.iter()? {
//!     let batch: ImageBatch = batch?;
//! }
//! ```
//!
//! # Memory Usage
//! - Single-threaded: O(batch_size)
//! - Multi-threaded: O(num_workers x prefetch_factor x batch_size)

mod config;
mod iterator;
mod loader;
mod workers;

pub use config::{DataLoaderConfig, DataLoaderConfigBuilder};
pub use iterator::DataLoaderIter;
pub use loader::DataLoader;
