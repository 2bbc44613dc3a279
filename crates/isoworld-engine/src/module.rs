//! The lifecycle contract shared by every stateful subsystem.
//!
//! A subsystem implements [`Module`] and overrides only the hooks it needs.
//! The engine never calls hooks directly; it goes through [`ManagedModule`],
//! which owns the `initialized` / `running` / `enabled` flags and enforces
//! the ordering rules:
//!
//! - `initialize` may run once until the module is destroyed.
//! - `start` requires a prior `initialize`.
//! - per-frame hooks are skipped unless the module is enabled and
//!   initialized.
//! - `destroy` stops a running module first and resets `initialized`.

use crate::EngineError;

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Lifecycle hooks. Every hook defaults to a no-op.
pub trait Module {
    /// Unique registry name.
    fn name(&self) -> &str;

    fn on_initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_fixed_update(&mut self, _dt: f64) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_update(&mut self, _dt: f64) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_late_update(&mut self, _dt: f64) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_stop(&mut self) {}

    fn on_destroy(&mut self) {}
}

// ---------------------------------------------------------------------------
// ManagedModule
// ---------------------------------------------------------------------------

/// A [`Module`] plus the state flags that guard its hooks.
pub struct ManagedModule {
    module: Box<dyn Module>,
    initialized: bool,
    running: bool,
    enabled: bool,
}

impl std::fmt::Debug for ManagedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedModule")
            .field("name", &self.module.name())
            .field("initialized", &self.initialized)
            .field("running", &self.running)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ManagedModule {
    /// Wrap a module. New modules start enabled and uninitialized.
    pub fn new(module: Box<dyn Module>) -> Self {
        Self {
            module,
            initialized: false,
            running: false,
            enabled: true,
        }
    }

    pub fn name(&self) -> &str {
        self.module.name()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Engine errors raised by a hook (e.g. a missing surface) pass through
    /// unchanged; anything else is wrapped with the module name.
    fn failed(&self, source: anyhow::Error) -> EngineError {
        match source.downcast::<EngineError>() {
            Ok(error) => error,
            Err(source) => EngineError::ModuleFailed {
                module: self.name().to_owned(),
                source,
            },
        }
    }

    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.initialized {
            return Err(EngineError::AlreadyInitialized {
                module: self.name().to_owned(),
            });
        }
        self.module.on_initialize().map_err(|e| self.failed(e))?;
        self.initialized = true;
        tracing::debug!(module = self.name(), "module initialized");
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        if !self.initialized {
            return Err(EngineError::NotInitialized {
                module: self.name().to_owned(),
            });
        }
        self.module.on_start().map_err(|e| self.failed(e))?;
        self.running = true;
        Ok(())
    }

    fn active(&self) -> bool {
        self.enabled && self.initialized
    }

    pub fn fixed_update(&mut self, dt: f64) -> Result<(), EngineError> {
        if !self.active() {
            return Ok(());
        }
        self.module.on_fixed_update(dt).map_err(|e| self.failed(e))
    }

    pub fn update(&mut self, dt: f64) -> Result<(), EngineError> {
        if !self.active() {
            return Ok(());
        }
        self.module.on_update(dt).map_err(|e| self.failed(e))
    }

    pub fn late_update(&mut self, dt: f64) -> Result<(), EngineError> {
        if !self.active() {
            return Ok(());
        }
        self.module.on_late_update(dt).map_err(|e| self.failed(e))
    }

    pub fn stop(&mut self) {
        if self.running {
            self.module.on_stop();
            self.running = false;
        }
    }

    pub fn destroy(&mut self) {
        self.stop();
        self.module.on_destroy();
        self.initialized = false;
        tracing::debug!(module = self.name(), "module destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Probe {
        calls: Rc<RefCell<Vec<&'static str>>>,
        fail_init: bool,
    }

    impl Module for Probe {
        fn name(&self) -> &str {
            "probe"
        }
        fn on_initialize(&mut self) -> anyhow::Result<()> {
            self.calls.borrow_mut().push("init");
            if self.fail_init {
                anyhow::bail!("no surface");
            }
            Ok(())
        }
        fn on_update(&mut self, _dt: f64) -> anyhow::Result<()> {
            self.calls.borrow_mut().push("update");
            Ok(())
        }
        fn on_stop(&mut self) {
            self.calls.borrow_mut().push("stop");
        }
        fn on_destroy(&mut self) {
            self.calls.borrow_mut().push("destroy");
        }
    }

    fn probe(fail_init: bool) -> (ManagedModule, Rc<RefCell<Vec<&'static str>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let m = ManagedModule::new(Box::new(Probe {
            calls: Rc::clone(&calls),
            fail_init,
        }));
        (m, calls)
    }

    #[test]
    fn double_initialize_is_rejected() {
        let (mut m, _) = probe(false);
        m.initialize().unwrap();
        assert!(matches!(
            m.initialize(),
            Err(EngineError::AlreadyInitialized { .. })
        ));
    }

    #[test]
    fn start_requires_initialize() {
        let (mut m, _) = probe(false);
        assert!(matches!(m.start(), Err(EngineError::NotInitialized { .. })));
    }

    #[test]
    fn updates_are_skipped_until_initialized_and_enabled() {
        let (mut m, calls) = probe(false);
        m.update(0.1).unwrap();
        m.initialize().unwrap();
        m.disable();
        m.update(0.1).unwrap();
        m.enable();
        m.update(0.1).unwrap();
        assert_eq!(*calls.borrow(), vec!["init", "update"]);
    }

    #[test]
    fn destroy_stops_and_resets() {
        let (mut m, calls) = probe(false);
        m.initialize().unwrap();
        m.start().unwrap();
        m.destroy();
        assert!(!m.is_initialized());
        assert!(!m.is_running());
        assert_eq!(*calls.borrow(), vec!["init", "stop", "destroy"]);
        m.initialize().unwrap();
    }

    #[test]
    fn failing_hook_is_wrapped_with_module_name() {
        let (mut m, _) = probe(true);
        match m.initialize() {
            Err(EngineError::ModuleFailed { module, source }) => {
                assert_eq!(module, "probe");
                assert_eq!(source.to_string(), "no surface");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!m.is_initialized());
    }
}
