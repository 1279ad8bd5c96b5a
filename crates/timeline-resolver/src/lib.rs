//! Montage Timeline Resolver
//!
//! Turns a validated [`Timeline`](montage_project_model::Timeline) into a
//! frame-level execution plan:
//! - **Frames:** For every frame instant, the video, audio and subtitle clips
//!   active at that instant and the completed transformations to apply
//! - **Dependencies:** The assets a render of the timeline needs
//!
//! Resolution is pure computation. Frames borrow from the timeline they were
//! resolved from.

pub mod dependencies;
pub mod resolver;

pub use dependencies::AssetDependencies;
pub use resolver::{
    resolve, ActiveClip, ActiveTransformation, ResolvedFrame, ResolvedTimeline, TimelineResolver,
};
