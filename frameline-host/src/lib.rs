//! # frameline-host: the frame producer process
//!
//! Renders frames on the configured device and streams each one to a
//! single connected viewer in lockstep chunks. When pose telemetry is
//! enabled, every frame is rendered from the pose the viewer sent with
//! its request.
//!
//! The host accepts exactly one viewer and exits when that session ends.

pub mod config;
pub mod service;
