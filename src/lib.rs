//! # pixelgate
//!
//! Defense-in-depth ingestion for untrusted image bytes. Given an upload, it
//! returns minimal metadata you can trust and a bounded derived artifact (a
//! thumbnail), without ever decoding hostile pixel data inside the caller's
//! process.
//!
//! # Architecture: Two Gates
//!
//! ```text
//! bytes ──▶ 1. Preflight (in process)  ──▶ 2. Isolation boundary ──▶ worker process
//!              sniff, verify, read header,    stage to temp file,      re-verify, bounded
//!              pixel ceiling                  spawn, timeout, reap     decode, thumbnail
//! ```
//!
//! Stage 1 is cheap and rejects the bulk of garbage: unknown formats, broken
//! containers and decompression bombs (by header fields alone). Stage 2 does
//! the heavy decode in a separate, short-lived process. Whatever happens in
//! there (a crash, a hang, an allocator blowup) is reported as a value to
//! the parent, never as a fault in it.
//!
//! The worker repeats the checks of stage 1. It may be invoked directly, and
//! the parent's check must not be a prerequisite for its safety.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`preflight`] | In-process gate: `check(bytes) -> Accepted(metadata) \| Rejected(reason)` |
//! | [`isolation`] | Stages bytes, runs the worker under a hard timeout, interprets its exit |
//! | [`worker`] | Logic of the `pixelgate-worker` binary |
//! | [`protocol`] | Worker wire contract: argument, environment, exit codes, JSON document |
//! | [`pipeline`] | Preflight then isolation, with client/server failure classes |
//! | [`imaging`] | Codec access behind the [`imaging::ImageBackend`] trait |
//! | [`config`] | `pixelgate.toml` loading and validation |
//! | [`types`] | Metadata and result types shared across the boundary |
//! | [`output`] | CLI output formatting and the JSON response document |
//!
//! # Design Decisions
//!
//! ## A Process, Not a Thread
//!
//! Memory corruption in a decoder cannot be contained by a thread or a
//! `catch_unwind`. The worker gets its own address space, a cleared
//! environment, no stdin, and only the path of a staged copy of the bytes.
//!
//! ## Verify Then Re-open
//!
//! Verification consumes its decoder handle. Every later read of the same
//! bytes goes through a fresh handle, in both the preflight checker and the
//! worker, so no half-consumed decoder state is ever reused.
//!
//! ## Pure-Rust Codecs
//!
//! The [`imaging`] module uses the `image` crate with a fixed set of format
//! features. Decoding runs under `image::Limits` derived from the pixel
//! ceiling, so even a lying header cannot drive an unbounded allocation.

pub mod config;
pub mod imaging;
pub mod isolation;
pub mod output;
pub mod pipeline;
pub mod preflight;
pub mod protocol;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;
