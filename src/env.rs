//! Settings read from the process environment once at start-up.

use std::sync::OnceLock;

use miette::{miette, Result};

const TRACE_VAR: &str = "XPIRE_TRACE";
const MAX_STEPS_VAR: &str = "XPIRE_MAX_STEPS";

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
struct Env {
    trace_enabled: bool,
    max_steps: Option<u64>,
}

impl Env {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Env> {
        let trace_enabled = lookup(TRACE_VAR).is_some_and(|v| v == "1");
        let max_steps = match lookup(MAX_STEPS_VAR) {
            Some(v) => Some(v.trim().parse::<u64>().map_err(|_| {
                miette!("{MAX_STEPS_VAR} must be a whole number of instructions, found `{v}`")
            })?),
            None => None,
        };
        Ok(Env {
            trace_enabled,
            max_steps,
        })
    }
}

static ENV: OnceLock<Env> = OnceLock::new();

/// Must be called at most once, before any other function in this module.
pub fn init() -> Result<()> {
    let value = Env::from_lookup(|name| std::env::var(name).ok())?;
    ENV.set(value)
        .map_err(|_| miette!("tried to initialize environment state multiple times"))
}

/// Defaults apply when `init` was never called.
fn env() -> Env {
    ENV.get().copied().unwrap_or_default()
}

/// `XPIRE_TRACE=1`: print every executed instruction to stderr.
pub fn is_trace_enabled() -> bool {
    env().trace_enabled
}

/// `XPIRE_MAX_STEPS`: instruction budget for runs that do not pass `--max-steps`.
pub fn max_steps() -> Option<u64> {
    env().max_steps
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(vars: &[(&str, &str)]) -> Result<Env> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Env::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(env_from(&[]).unwrap(), Env::default());
    }

    #[test]
    fn reads_settings() {
        let env = env_from(&[("XPIRE_TRACE", "1"), ("XPIRE_MAX_STEPS", " 5000 ")]).unwrap();
        assert!(env.trace_enabled);
        assert_eq!(env.max_steps, Some(5000));

        let env = env_from(&[("XPIRE_TRACE", "yes")]).unwrap();
        assert!(!env.trace_enabled);
    }

    #[test]
    fn rejects_bad_step_count() {
        let err = env_from(&[("XPIRE_MAX_STEPS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("found `lots`"));
    }
}
