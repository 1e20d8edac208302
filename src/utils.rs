// src/utils.rs

//! Thin wrappers over the Win32 and PowerShell surfaces the native accessors
//! drive. Everything here reports failures as `anyhow` errors with context.

pub mod elevation;
pub mod powershell;
pub mod registry;
pub mod services;
