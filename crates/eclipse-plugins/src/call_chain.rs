//! Active cross-plugin call chain
//!
//! Commands run synchronously on the caller's stack, so an import cycle
//! would otherwise recurse without bound. Every command invocation pushes a
//! `(plugin, command)` frame for the current thread; a frame that is already
//! on the chain, or a chain longer than the configured depth, is refused.

use crate::error::{PluginError, PluginResult};
use std::cell::RefCell;

/// Default maximum number of nested command invocations
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

thread_local! {
    static ACTIVE_CALLS: RefCell<Vec<(String, String)>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one active invocation; popped on drop
#[derive(Debug)]
pub(crate) struct CallFrame {
    _private: (),
}

impl CallFrame {
    pub(crate) fn enter(plugin: &str, procedure: &str, max_depth: usize) -> PluginResult<Self> {
        ACTIVE_CALLS.with(|calls| {
            let mut calls = calls.borrow_mut();

            if calls.iter().any(|(p, c)| p == plugin && c == procedure) {
                let chain = calls
                    .iter()
                    .map(|(p, c)| format!("{p}.{c}"))
                    .chain(std::iter::once(format!("{plugin}.{procedure}")))
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(PluginError::CallCycleDetected { chain });
            }

            if calls.len() >= max_depth {
                return Err(PluginError::CallDepthExceeded {
                    plugin: plugin.to_string(),
                    procedure: procedure.to_string(),
                    limit: max_depth,
                });
            }

            calls.push((plugin.to_string(), procedure.to_string()));
            Ok(CallFrame { _private: () })
        })
    }
}

impl Drop for CallFrame {
    fn drop(&mut self) {
        ACTIVE_CALLS.with(|calls| {
            calls.borrow_mut().pop();
        });
    }
}

/// Number of invocations active on the current thread
pub fn active_depth() -> usize {
    ACTIVE_CALLS.with(|calls| calls.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_pop_on_drop() {
        {
            let _a = CallFrame::enter("app", "main", 8).unwrap();
            let _b = CallFrame::enter("math", "add", 8).unwrap();
            assert_eq!(active_depth(), 2);
        }
        assert_eq!(active_depth(), 0);
    }

    #[test]
    fn test_repeated_pair_is_cycle() {
        let _a = CallFrame::enter("a", "ping", 8).unwrap();
        let _b = CallFrame::enter("b", "pong", 8).unwrap();

        match CallFrame::enter("a", "ping", 8) {
            Err(PluginError::CallCycleDetected { chain }) => {
                assert_eq!(chain, "a.ping -> b.pong -> a.ping");
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(active_depth(), 2);
    }

    #[test]
    fn test_depth_limit() {
        let _a = CallFrame::enter("a", "one", 2).unwrap();
        let _b = CallFrame::enter("a", "two", 2).unwrap();
        assert!(matches!(
            CallFrame::enter("a", "three", 2),
            Err(PluginError::CallDepthExceeded { limit: 2, .. })
        ));
    }
}
