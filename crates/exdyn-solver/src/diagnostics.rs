//! Diagnostics context injected into the formulation.
//!
//! Explicitly constructed and passed in; there is no process-wide
//! logging or accounting singleton. Output goes through `log`, so
//! drivers decide what is recorded. None of this affects correctness.

use std::time::Instant;

use exdyn_model::Field;

/// Diagnostics configuration and emission for one formulation
/// instance.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    prefix: String,
    /// Dump the lumped Jacobian after each reform.
    pub view_jacobian: bool,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            prefix: "TSEx".to_string(),
            view_jacobian: false,
        }
    }
}

impl Diagnostics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            view_jacobian: false,
        }
    }

    pub fn with_jacobian_view(mut self, enabled: bool) -> Self {
        self.view_jacobian = enabled;
        self
    }

    /// Begin a named phase; the returned span logs elapsed wall time
    /// when dropped. The span owns its label so it can outlive
    /// borrows of the diagnostics context.
    pub fn phase(&self, name: &'static str) -> PhaseSpan {
        log::debug!("{} {name} begin", self.prefix);
        PhaseSpan {
            prefix: self.prefix.clone(),
            name,
            start: Instant::now(),
        }
    }

    pub fn info(&self, message: &str) {
        log::info!("{} {message}", self.prefix);
    }

    /// Dump a field's entries, if jacobian viewing is enabled.
    pub fn view_field(&self, field: &Field) {
        if !self.view_jacobian {
            return;
        }
        log::info!(
            "{} {} ({} dofs): {:?}",
            self.prefix,
            field.role(),
            field.len(),
            field.as_slice()
        );
    }
}

/// Phase timing span; logs on drop.
pub struct PhaseSpan {
    prefix: String,
    name: &'static str,
    start: Instant,
}

impl Drop for PhaseSpan {
    fn drop(&mut self) {
        log::debug!(
            "{} {} end ({:.1?})",
            self.prefix,
            self.name,
            self.start.elapsed()
        );
    }
}
