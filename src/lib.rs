//! quire: scan documents from the command line and file them under tags.
//!
//! The binary parses [`cli::Cli`], loads the configuration, installs
//! [`logging`] and hands over to [`app::run`], which finds a scanner, drives
//! one session and files the pages.

pub mod app;
pub mod cli;
pub mod error;
pub mod logging;
