//! Montage Audio
//!
//! Composes the audio clips of a resolved timeline into one stereo stream:
//! - **Sources:** Where a clip's playable audio lives ([`AudioSourceResolver`])
//! - **Planning:** Per-clip delay, trim and gain, and the ffmpeg filter graph
//! - **Composition:** Running the plan through a [`MediaBackend`](montage_common::media::MediaBackend)

pub mod composer;
pub mod source;

pub use composer::{gain_db, AudioComposer, AudioInput, AudioMixPlan};
pub use source::{AudioSourceResolver, ClipAttachmentResolver};
