//! # handpack
//!
//! A declarative package command engine for homebrew overlay launchers.
//!
//! Packages are directories holding an INI-dialect command file. Each section
//! of that file is an ordered list of commands; command tokens may embed
//! `{...}` placeholder expressions resolved from JSON documents, literal
//! lists, or binary hex lookups. The [`core::interpreter::Interpreter`] walks
//! a section's commands and dispatches each verb to the file-ops, network,
//! archive, INI, or hex-patch engines, reporting progress through shared
//! atomics so a host UI can observe long-running work.
//!
//! The host UI itself (menu rendering, input, console services) is not part
//! of this crate; the `handpack` binary is a thin driver over the library.

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
