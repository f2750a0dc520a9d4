//! CPU notification slots.
//!
//! Each event has exactly one slot. Registering a listener replaces
//! whatever was there before.

use crate::bits::Byte;
use crate::cpu::CpuError;

type Notify = Box<dyn FnMut()>;
type NotifyByte = Box<dyn FnMut(&Byte)>;
type NotifyError = Box<dyn FnMut(&CpuError)>;

/// One optional callback per event kind.
#[derive(Default)]
pub struct Listeners {
    run: Option<Notify>,
    step: Option<NotifyByte>,
    reset: Option<Notify>,
    error: Option<NotifyError>,
    out: Option<NotifyByte>,
}

impl Listeners {
    pub fn set_run(&mut self, f: impl FnMut() + 'static) {
        self.run = Some(Box::new(f));
    }

    /// Called after every step with the new PC.
    pub fn set_step(&mut self, f: impl FnMut(&Byte) + 'static) {
        self.step = Some(Box::new(f));
    }

    pub fn set_reset(&mut self, f: impl FnMut() + 'static) {
        self.reset = Some(Box::new(f));
    }

    pub fn set_error(&mut self, f: impl FnMut(&CpuError) + 'static) {
        self.error = Some(Box::new(f));
    }

    /// Called with the byte written by every `OUT`.
    pub fn set_out(&mut self, f: impl FnMut(&Byte) + 'static) {
        self.out = Some(Box::new(f));
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        *self = Listeners::default();
    }

    pub(crate) fn emit_run(&mut self) {
        if let Some(f) = self.run.as_mut() {
            f();
        }
    }

    pub(crate) fn emit_step(&mut self, pc: &Byte) {
        if let Some(f) = self.step.as_mut() {
            f(pc);
        }
    }

    pub(crate) fn emit_reset(&mut self) {
        if let Some(f) = self.reset.as_mut() {
            f();
        }
    }

    pub(crate) fn emit_error(&mut self, err: &CpuError) {
        if let Some(f) = self.error.as_mut() {
            f(err);
        }
    }

    pub(crate) fn emit_out(&mut self, value: &Byte) {
        if let Some(f) = self.out.as_mut() {
            f(value);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("run", &self.run.is_some())
            .field("step", &self.step.is_some())
            .field("reset", &self.reset.is_some())
            .field("error", &self.error.is_some())
            .field("out", &self.out.is_some())
            .finish()
    }
}
