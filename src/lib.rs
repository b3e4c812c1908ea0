//! Purpose: Mockable session layer over a CQL driver, with typed row mapping.
//! Exports: `api` (public session contract), `core` (values, cursors, scans, errors).
//! Role: Library crate; the network driver is supplied through `core::driver::Driver`.
//! Invariants: No network I/O happens in this crate; all of it goes through the driver seam.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
