//! Domain model and pure pipeline logic for story-to-film generation.
//!
//! Everything in this crate is free of network I/O except the thin
//! ffmpeg/ffprobe process helpers in [`ffmpeg`]. The remote generative
//! service and the compositing engine are reached through the traits in
//! [`service`] and [`compositor`].

pub mod composition;
pub mod compositor;
pub mod continuity;
pub mod error;
pub mod ffmpeg;
pub mod generation;
pub mod prompt;
pub mod service;
pub mod types;
