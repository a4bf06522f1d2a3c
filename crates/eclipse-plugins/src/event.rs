//! Lifecycle hooks

use crate::error::{PluginError, PluginResult};
use eclipse_kernel::{EngineAdapter, ProcedureRef, Value};
use tracing::debug;

/// Fired after the plugin is parsed, before import resolution
pub const ON_LOAD: &str = "OnLoad";
/// Fired with the plugin's own descriptor after batch import resolution
pub const ON_READY: &str = "OnReady";
/// Fired before the engine instance is released
pub const ON_UNLOAD: &str = "OnUnload";

/// A named hook bound to a procedure
#[derive(Debug, Clone)]
pub struct Event {
    name: String,
    procedure: ProcedureRef,
}

impl Event {
    pub fn new(name: impl Into<String>, procedure: ProcedureRef) -> Self {
        Self {
            name: name.into(),
            procedure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn procedure(&self) -> &ProcedureRef {
        &self.procedure
    }

    /// Run the hook, discarding any result. Faults always reach the caller.
    pub fn fire(&self, engine: &dyn EngineAdapter, args: Vec<Value>) -> PluginResult<()> {
        debug!(event = %self.name, "Firing event");
        engine
            .call(&self.procedure, args)
            .map(|_| ())
            .map_err(|fault| PluginError::from_fault(&self.name, fault))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eclipse_kernel::ScriptSource;
    use eclipse_script::{RhaiEngine, ScriptEngineConfig};

    #[test]
    fn test_fire_propagates_faults() {
        let mut engine = RhaiEngine::new(ScriptEngineConfig::default());
        let value = engine
            .execute(&ScriptSource::inline(
                "events.rhai",
                r#"#{ Ok: || 1, Fails: || { throw "hook failed"; } }"#,
            ))
            .unwrap();

        let ok = Event::new("Ok", value.field("Ok").as_procedure().unwrap().clone());
        assert!(ok.fire(&engine, vec![]).is_ok());

        let fails = Event::new("Fails", value.field("Fails").as_procedure().unwrap().clone());
        match fails.fire(&engine, vec![]) {
            Err(PluginError::Invocation { procedure, fault }) => {
                assert_eq!(procedure, "Fails");
                assert!(fault.to_string().contains("hook failed"));
            }
            other => panic!("expected invocation error, got {other:?}"),
        }
    }
}
