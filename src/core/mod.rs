// src/core/mod.rs

pub mod fileops;
pub mod hexpatch;
pub mod ini;
pub mod interpreter;
pub mod package;
pub mod patch;
pub mod paths;
pub mod placeholder;
pub mod signals;
pub mod strings;
