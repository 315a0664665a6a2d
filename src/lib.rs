//! Formguard - Rate-Limited Contact Form Service
//!
//! This crate guards a partner inquiry form with an in-memory, sliding-window
//! rate limiter keyed by client address, then validates accepted submissions
//! and relays them through a pluggable delivery sink.

pub mod config;
pub mod error;
pub mod http;
pub mod inquiry;
pub mod ratelimit;
