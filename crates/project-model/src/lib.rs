//! Montage Project Model
//!
//! Defines the core data contracts for Montage render jobs:
//! - **Timeline:** Typed tracks of time-positioned clips, validated at parse time
//! - **Assets:** `store://<bucket>/<key>` addressing and artifact key layout
//! - **Artifacts:** Files produced while composing a render
//! - **Jobs:** Render requests, status updates, the render state machine, and output
//!
//! All times are seconds on the timeline clock (`f64`).

pub mod artifact;
pub mod asset;
pub mod error;
pub mod job;
pub mod resolution;
pub mod timeline;

pub use artifact::*;
pub use asset::*;
pub use error::*;
pub use job::*;
pub use resolution::*;
pub use timeline::*;
