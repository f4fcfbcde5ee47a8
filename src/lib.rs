//! poegate — webhook service for PoE port power control.
//!
//! Translates power on/off/cycle webhooks into calls against the UniFi
//! Network integration API, pacing them so the controller is never hit
//! faster than it tolerates. The interesting part lives in [`power`]: a
//! per-(port, operation) rate limiter, a per-port device cooldown gate,
//! and a single background worker that drains deferred operations.

pub mod cli;
pub mod config;
pub mod power;
pub mod server;
pub mod unifi;
