//! roasty-rs: control host for a hot-air coffee roaster.
//!
//! A roast follows a [`profile::Profile`] of time/temperature setpoints. The
//! [`engine::RoastEngine`] preheats, roasts and completes against either a
//! simulated thermal model or the real machine ([`plant::Plant`]), driving
//! fan and heater with a proportional [`controller::Controller`]. The
//! [`roaster`] task owns the engine and ticks it; [`web`] exposes it over
//! HTTP and WebSocket; [`storage`] keeps roast logs and named profiles.

pub mod config;
pub mod controller;
pub mod engine;
pub mod hardware;
pub mod plant;
pub mod profile;
pub mod roaster;
pub mod scheduler;
pub mod storage;
pub mod web;
