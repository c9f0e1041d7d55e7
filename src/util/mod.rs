//! Common utility functions shared across the store's components.

pub mod files;

pub use files::{allocate_sparse, create_file_a, load_toml, open_file_a, open_file_r, sync_write};
