//! Purpose: Library crate backing the `starnotary` CLI and HTTP server.
//! Exports: `api` (stable surface), `core` (validation, range planning, storage, errors).
//! Role: Records ownership claims over numbered stars and serves them in ranges.
//! Invariants: Validation and range resolution are pure; all I/O goes through `StarStore`.
//! Invariants: Token ids are assigned by the caller and expected to grow over time.
pub mod api;
pub mod core;
mod data_paths;
