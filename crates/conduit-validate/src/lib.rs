// SPDX-License-Identifier: MIT OR Apache-2.0
//! conduit-validate
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Input validation middleware: built-in injection/control-character/size
//! checks plus a pluggable custom-validator chain, running after
//! authentication in the pipeline.

/// Pluggable custom validators and the validation report shape.
pub mod custom;
/// The `ValidationMiddleware` itself.
pub mod middleware;
/// Built-in injection-pattern detectors.
pub mod patterns;

pub use custom::{ValidationReport, Validator};
pub use middleware::{ValidationConfig, ValidationMiddleware};
pub use patterns::{InjectionKind, ALL_INJECTION_KINDS};
