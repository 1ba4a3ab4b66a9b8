// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime utilities for observability.
//!
//! This module provides logging of the external commands run while writing
//! a kubeconfig.

mod logging;

pub use logging::{CommandLogger, CommandSpan, LogLevel, LoggingConfig};
