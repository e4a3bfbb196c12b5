//! Directory-mirror link reconciliation.
//!
//! Mirrors a source tree of dotfiles into a destination tree: every source
//! folder becomes a real folder and every source file becomes a symbolic link
//! back into the source.  Conflicts (real files or stale links in the way)
//! are resolved one decision at a time before anything is changed.
//!
//! The public API is organised into four layers:
//!
//! - **[`config`]**: resolve and validate roots, read ignore and settings files
//! - **[`resources`]**: idempotent `check + apply` filesystem primitives
//! - **[`engine`]**: scan, classify, resolve, and apply a plan
//! - **[`commands`]**: top-level subcommand orchestration (`deploy`, `status`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod resources;
