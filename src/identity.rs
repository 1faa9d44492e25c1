//! Annotator resolution for Marginalia commands.
//!
//! Every command that touches the access log needs to know who is annotating.
//! Rather than requiring `--as` on every invocation, the annotator is resolved
//! through a chain:
//!
//! 1. `--as <user>`: explicit per-command override
//! 2. `MARGINALIA_USER` env var: process or session level
//! 3. `user` in `~/.marginalia/config.toml`: global default

use std::env;

use crate::config::Config;

/// Error message shown when no annotator can be resolved.
pub const USER_REQUIRED: &str = "annotator required: pass --as <user>, \
    set MARGINALIA_USER, or add `user = \"...\"` to ~/.marginalia/config.toml";

/// Resolve the acting annotator from the resolution chain.
pub fn resolve_user(explicit: Option<&str>, config: &Config) -> Result<String, String> {
    let from_env = env::var("MARGINALIA_USER").ok();
    pick(explicit, from_env.as_deref(), config.user.as_deref())
}

fn pick(explicit: Option<&str>, env: Option<&str>, config: Option<&str>) -> Result<String, String> {
    [explicit, env, config]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|user| !user.is_empty())
        .map(String::from)
        .ok_or_else(|| USER_REQUIRED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_wins() {
        assert_eq!(pick(Some("ann"), Some("bob"), Some("cy")).unwrap(), "ann");
    }

    #[test]
    fn env_beats_config() {
        assert_eq!(pick(None, Some("bob"), Some("cy")).unwrap(), "bob");
    }

    #[test]
    fn empty_values_fall_through() {
        assert_eq!(pick(Some(""), Some("  "), Some("cy")).unwrap(), "cy");
    }

    #[test]
    fn nothing_set_is_an_error() {
        assert_eq!(pick(None, None, None).unwrap_err(), USER_REQUIRED);
    }
}
