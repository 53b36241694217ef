use std::cell::RefCell;
use std::rc::Rc;

use crate::device::DeviceError;

/// Receives non-fatal device errors raised while rendering.
pub trait DiagnosticSink {
    /// `context` names the renderer step that observed the error.
    fn report(&mut self, context: &str, error: &DeviceError);
}

/// Forwards reports to the `log` facade at `warn` level.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, context: &str, error: &DeviceError) {
        log::warn!("[{context}] {error}");
    }
}

/// Collects reports in memory. Clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    reports: Rc<RefCell<Vec<(String, DeviceError)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(String, DeviceError)> {
        self.reports.borrow().clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&mut self, context: &str, error: &DeviceError) {
        self.reports
            .borrow_mut()
            .push((context.to_string(), error.clone()));
    }
}
