//! # velora
//!
//! HTTP server and command line for the VELORA wellness platform - THE BINARY.
//!
//! Every business rule lives in `velora-core`. This crate owns what the core
//! deliberately leaves out: the clock, configuration, logging, email
//! delivery, and the network.

pub mod api;
pub mod cli;
pub mod config;
pub mod mailer;
