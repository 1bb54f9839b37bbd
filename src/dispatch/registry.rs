//! Command registry and dispatch.
//!
//! The registry maps method names to handlers and resolves every incoming
//! command. Six methods are built in and always available; collaborator
//! subsystems add their own at startup via [`CommandRegistry::register`].
//!
//! # Example
//!
//! ```
//! use fixlink::dispatch::{ChipInfo, CommandOutcome, CommandRegistry};
//! use serde_json::{json, Value};
//!
//! let registry = CommandRegistry::new(
//!     "1.0.0",
//!     ChipInfo {
//!         name: "fixture".into(),
//!         model: "esp32s3".into(),
//!         revision: 1,
//!         cores: 2,
//!     },
//! );
//!
//! registry
//!     .register("pin-map", |_params: Option<&Value>| {
//!         CommandOutcome::result(json!({"pins": []}))
//!     })
//!     .unwrap();
//!
//! let outcome = registry.dispatch("version", None, 0);
//! assert_eq!(outcome.result.unwrap()["version"], "1.0.0");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};
use tracing::debug;

use crate::error::{FixlinkError, Result};
use crate::rpc::{RpcError, INVALID_PARAMS, METHOD_NOT_FOUND};

use super::command::{ActionDirective, ChipInfo, Command, CommandOutcome};

/// Delay between accepting a reboot command and acting on it, so the reply
/// frame has time to leave the transmitter.
const REBOOT_DELAY_MS: u64 = 500;

/// Methods handled by the registry itself. Registration of these names is
/// refused so a collaborator can never shadow them.
const BUILTIN_METHODS: &[&str] = &[
    "version",
    "uptime",
    "reboot",
    "echo",
    "chip-info",
    "set-baud",
];

/// Thread-safe command registry with built-in methods.
pub struct CommandRegistry {
    firmware_version: String,
    chip_info: ChipInfo,
    handlers: Mutex<HashMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    /// Create a registry with the identity reported by `version` and
    /// `chip-info`.
    pub fn new(firmware_version: impl Into<String>, chip_info: ChipInfo) -> Self {
        Self {
            firmware_version: firmware_version.into(),
            chip_info,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a handler for `method`.
    ///
    /// Fails if the name is empty, collides with a built-in, or is already
    /// taken. The first registration always wins.
    pub fn register(
        &self,
        method: impl Into<String>,
        handler: impl Command + 'static,
    ) -> Result<()> {
        let method = method.into();
        if method.is_empty() {
            return Err(FixlinkError::InvalidMethod);
        }
        if BUILTIN_METHODS.contains(&method.as_str()) {
            return Err(FixlinkError::AlreadyRegistered(method));
        }

        let mut handlers = self.lock_handlers();
        if handlers.contains_key(&method) {
            return Err(FixlinkError::AlreadyRegistered(method));
        }
        debug!(method = %method, "command registered");
        handlers.insert(method, Arc::new(handler));
        Ok(())
    }

    /// Register a table of handlers, stopping at the first failure.
    pub fn register_table<I>(&self, table: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Arc<dyn Command>)>,
    {
        for (method, handler) in table {
            if method.is_empty() {
                return Err(FixlinkError::InvalidMethod);
            }
            if BUILTIN_METHODS.contains(&method.as_str()) {
                return Err(FixlinkError::AlreadyRegistered(method));
            }
            let mut handlers = self.lock_handlers();
            if handlers.contains_key(&method) {
                return Err(FixlinkError::AlreadyRegistered(method));
            }
            handlers.insert(method, handler);
        }
        Ok(())
    }

    /// Resolve and execute a command.
    ///
    /// Built-ins run without the lock. Registered handlers run while the
    /// lock is held, which serializes them against registration. A handler
    /// that reports an error has its action directive discarded.
    pub fn dispatch(&self, method: &str, params: Option<&Value>, now_ms: u64) -> CommandOutcome {
        if method.is_empty() {
            return CommandOutcome::error(RpcError::new(
                METHOD_NOT_FOUND,
                "Invalid method string",
            ));
        }

        if let Some(outcome) = self.dispatch_builtin(method, params, now_ms) {
            return sanitize(outcome);
        }

        let handlers = self.lock_handlers();
        match handlers.get(method) {
            Some(handler) => sanitize(handler.call(params)),
            None => CommandOutcome::error(RpcError::new(METHOD_NOT_FOUND, "Method not supported")),
        }
    }

    fn dispatch_builtin(
        &self,
        method: &str,
        params: Option<&Value>,
        now_ms: u64,
    ) -> Option<CommandOutcome> {
        let outcome = match method {
            "version" => CommandOutcome::result(json!({ "version": self.firmware_version })),
            "uptime" => CommandOutcome::result(json!({ "uptime": now_ms / 1000 })),
            "reboot" => CommandOutcome {
                action: ActionDirective {
                    reboot_at_ms: Some(now_ms + REBOOT_DELAY_MS),
                    ..ActionDirective::default()
                },
                ..CommandOutcome::ok()
            },
            "echo" => {
                let data = params
                    .and_then(|p| p.get("data"))
                    .cloned()
                    .unwrap_or_else(|| json!(""));
                CommandOutcome::result(json!({ "data": data }))
            }
            "chip-info" => CommandOutcome::result(json!(self.chip_info)),
            "set-baud" => match params.and_then(|p| p.get("value")).and_then(Value::as_u64) {
                Some(baud) => CommandOutcome {
                    action: ActionDirective {
                        new_baud: Some(baud as u32),
                        ..ActionDirective::default()
                    },
                    ..CommandOutcome::ok()
                },
                None => {
                    CommandOutcome::error(RpcError::new(INVALID_PARAMS, "Baud value required"))
                }
            },
            _ => return None,
        };
        Some(outcome)
    }

    fn lock_handlers(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn Command>>> {
        match self.handlers.lock() {
            Ok(guard) => guard,
            // A panicking handler must not wedge dispatch for good.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// An errored command performs no side effect.
fn sanitize(mut outcome: CommandOutcome) -> CommandOutcome {
    if outcome.error.is_some() {
        outcome.action = ActionDirective::default();
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::INTERNAL_ERROR;

    fn test_registry() -> CommandRegistry {
        CommandRegistry::new(
            "2.4.1",
            ChipInfo {
                name: "fixture-a".into(),
                model: "esp32s3".into(),
                revision: 3,
                cores: 2,
            },
        )
    }

    #[test]
    fn test_version_builtin() {
        let outcome = test_registry().dispatch("version", None, 0);
        assert_eq!(outcome.result.unwrap()["version"], "2.4.1");
    }

    #[test]
    fn test_uptime_reports_whole_seconds() {
        let outcome = test_registry().dispatch("uptime", None, 42_999);
        assert_eq!(outcome.result.unwrap()["uptime"], 42);
    }

    #[test]
    fn test_reboot_schedules_delayed_restart() {
        let outcome = test_registry().dispatch("reboot", None, 10_000);
        assert!(outcome.result.is_none());
        assert!(outcome.error.is_none());
        assert_eq!(outcome.action.reboot_at_ms, Some(10_500));
    }

    #[test]
    fn test_echo_returns_data() {
        let params = json!({"data": "hello"});
        let outcome = test_registry().dispatch("echo", Some(&params), 0);
        assert_eq!(outcome.result.unwrap()["data"], "hello");
    }

    #[test]
    fn test_echo_defaults_to_empty_string() {
        let outcome = test_registry().dispatch("echo", None, 0);
        assert_eq!(outcome.result.unwrap()["data"], "");
    }

    #[test]
    fn test_chip_info() {
        let outcome = test_registry().dispatch("chip-info", None, 0);
        let info = outcome.result.unwrap();
        assert_eq!(info["name"], "fixture-a");
        assert_eq!(info["model"], "esp32s3");
        assert_eq!(info["revision"], 3);
        assert_eq!(info["cores"], 2);
    }

    #[test]
    fn test_set_baud_requires_value() {
        let registry = test_registry();

        let err = registry.dispatch("set-baud", None, 0).error.unwrap();
        assert_eq!(err.code, INVALID_PARAMS);
        assert_eq!(err.message, "Baud value required");

        let params = json!({"value": "fast"});
        let err = registry.dispatch("set-baud", Some(&params), 0).error.unwrap();
        assert_eq!(err.code, INVALID_PARAMS);
    }

    #[test]
    fn test_set_baud_directive() {
        let params = json!({"value": 921600});
        let outcome = test_registry().dispatch("set-baud", Some(&params), 0);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.action.new_baud, Some(921_600));
    }

    #[test]
    fn test_unknown_method() {
        let err = test_registry().dispatch("no-such", None, 0).error.unwrap();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert_eq!(err.message, "Method not supported");
    }

    #[test]
    fn test_empty_method() {
        let err = test_registry().dispatch("", None, 0).error.unwrap();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert_eq!(err.message, "Invalid method string");
    }

    #[test]
    fn test_registered_handler_dispatches() {
        let registry = test_registry();
        registry
            .register("pin-map", |_params: Option<&Value>| {
                CommandOutcome::result(json!({"pins": [1, 2, 3]}))
            })
            .unwrap();

        let outcome = registry.dispatch("pin-map", None, 0);
        assert_eq!(outcome.result.unwrap()["pins"][0], 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = test_registry();
        registry
            .register("scan", |_: Option<&Value>| CommandOutcome::ok())
            .unwrap();

        let err = registry
            .register("scan", |_: Option<&Value>| {
                CommandOutcome::result(json!("second"))
            })
            .unwrap_err();
        assert!(matches!(err, FixlinkError::AlreadyRegistered(m) if m == "scan"));

        // First handler still answers.
        let outcome = registry.dispatch("scan", None, 0);
        assert!(outcome.result.is_none());
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_builtin_names_cannot_be_registered() {
        let registry = test_registry();
        for method in BUILTIN_METHODS {
            assert!(registry
                .register(*method, |_: Option<&Value>| CommandOutcome::ok())
                .is_err());
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = test_registry()
            .register("", |_: Option<&Value>| CommandOutcome::ok())
            .unwrap_err();
        assert!(matches!(err, FixlinkError::InvalidMethod));
    }

    #[test]
    fn test_register_table() {
        let registry = test_registry();
        let table: Vec<(String, Arc<dyn Command>)> = vec![
            (
                "pin-map".into(),
                Arc::new(|_: Option<&Value>| CommandOutcome::ok()),
            ),
            (
                "pin-set".into(),
                Arc::new(|_: Option<&Value>| CommandOutcome::ok()),
            ),
        ];
        registry.register_table(table).unwrap();

        assert!(registry.dispatch("pin-map", None, 0).error.is_none());
        assert!(registry.dispatch("pin-set", None, 0).error.is_none());
    }

    #[test]
    fn test_handler_error_drops_directive() {
        let registry = test_registry();
        registry
            .register("broken", |_: Option<&Value>| CommandOutcome {
                error: Some(RpcError::new(INTERNAL_ERROR, "hardware fault")),
                action: ActionDirective {
                    new_baud: Some(9600),
                    reboot_at_ms: Some(1),
                },
                ..CommandOutcome::default()
            })
            .unwrap();

        let outcome = registry.dispatch("broken", None, 0);
        assert!(outcome.error.is_some());
        assert!(outcome.action.is_empty());
    }
}
