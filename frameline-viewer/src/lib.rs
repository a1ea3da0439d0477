//! # frameline-viewer: the frame consumer process
//!
//! Connects once to `frameline-host`, receives every frame in lockstep
//! chunks on a background worker, composites it under the local scene
//! and presents the result. The local pose is sent to the host before
//! each frame when pose telemetry is on.

pub mod config;
pub mod input;
pub mod service;
pub mod snapshot;
