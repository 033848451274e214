//! Application services

mod diagnostics;

pub use diagnostics::DiagnosticsService;
