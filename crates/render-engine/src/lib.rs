//! Montage Render Engine
//!
//! Executes render jobs: fetches source media, composes audio and subtitles,
//! runs the final transcode and publishes the result.
//!
//! # Pipeline Architecture
//!
//! ```text
//! request ── timeline ── resolve ──┬── video sourceRef ── fetch ───────┐
//!                                  ├── audio clips ── fetch ── mix ────┤
//!                                  └── subtitle clips ── ASS ──────────┤
//!                                                                      ▼
//!                                   scale/pad/fps + burn-in, H.264/AAC encode
//!                                                                      │
//!                                                        thumbnail ◄───┤
//!                                                                      ▼
//!                                                         publish to the store
//! ```

pub mod orchestrator;
pub mod sequencer;
pub mod status;
pub mod store;
pub mod transcode;
pub mod transform;
pub mod workspace;

pub use orchestrator::{RenderHandle, Renderer};
pub use sequencer::{ClipSequencer, SequencedVideo, SingleSourceSequencer, VideoSource};
pub use status::{ChannelStatusSink, JobStatusSink, TracingStatusSink};
pub use store::{LocalObjectStore, ObjectStore, RetryingStore};
pub use transcode::{EncodeSettings, TranscodePlan};
pub use transform::{PassthroughTransformations, TransformationApplier};
pub use workspace::JobWorkspace;
