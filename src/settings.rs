//! Runtime configuration: constants by default, environment overrides on
//! request.
//!
//! [`RuntimeSettings::default`] is pure (no environment reads) so tests get
//! stable values; [`RuntimeSettings::from_env`] layers `COLLOQUY_*`
//! variables (via `dotenvy`, so a local `.env` works) over those defaults.
//! Unparseable values fall back to the default rather than failing startup.

use std::time::Duration;

use crate::buffer::InMemoryArrivalStore;
use crate::debounce::DebounceSettings;

/// How decision attempts are bounded and retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeciderSettings {
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Retries after the first attempt before degrading.
    pub retries: u32,
    /// Base for the jittered exponential backoff between attempts.
    pub backoff_base: Duration,
}

impl DeciderSettings {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_RETRIES: u32 = 2;
    pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(250);
}

impl Default for DeciderSettings {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            retries: Self::DEFAULT_RETRIES,
            backoff_base: Self::DEFAULT_BACKOFF_BASE,
        }
    }
}

/// Everything the turn runner needs to know that isn't a collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    /// Quiet-threshold and poll cadence for the debounce coordinator.
    pub debounce: DebounceSettings,
    /// How long idle buffer slots survive before expiry.
    pub buffer_ttl: Duration,
    /// Decision attempt bounds.
    pub decider: DeciderSettings,
    /// What the contact hears when every decision attempt failed.
    pub fallback_reply: String,
    /// Most recent history entries shipped to the decider.
    pub history_window: usize,
}

impl RuntimeSettings {
    pub const DEFAULT_FALLBACK_REPLY: &'static str =
        "Sorry, something went wrong on our side. A teammate will pick this up shortly.";
    pub const DEFAULT_HISTORY_WINDOW: usize = 30;

    /// Defaults layered with `COLLOQUY_*` environment overrides:
    ///
    /// - `COLLOQUY_DEBOUNCE_MS`: quiet threshold
    /// - `COLLOQUY_POLL_MS`: coordinator poll interval
    /// - `COLLOQUY_BUFFER_TTL_MS`: arrival buffer slot TTL
    /// - `COLLOQUY_DECIDER_TIMEOUT_MS`: per-attempt decision deadline
    /// - `COLLOQUY_DECIDER_RETRIES`: retry bound before degrading
    /// - `COLLOQUY_FALLBACK_REPLY`: canned degradation reply
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            debounce: DebounceSettings::new(
                env_duration_ms("COLLOQUY_DEBOUNCE_MS", defaults.debounce.inactivity_threshold),
                env_duration_ms("COLLOQUY_POLL_MS", defaults.debounce.poll_interval),
            ),
            buffer_ttl: env_duration_ms("COLLOQUY_BUFFER_TTL_MS", defaults.buffer_ttl),
            decider: DeciderSettings {
                timeout: env_duration_ms("COLLOQUY_DECIDER_TIMEOUT_MS", defaults.decider.timeout),
                retries: env_u32("COLLOQUY_DECIDER_RETRIES", defaults.decider.retries),
                backoff_base: defaults.decider.backoff_base,
            },
            fallback_reply: std::env::var("COLLOQUY_FALLBACK_REPLY")
                .unwrap_or(defaults.fallback_reply),
            history_window: defaults.history_window,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: DebounceSettings) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_buffer_ttl(mut self, ttl: Duration) -> Self {
        self.buffer_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_decider(mut self, decider: DeciderSettings) -> Self {
        self.decider = decider;
        self
    }

    #[must_use]
    pub fn with_fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = reply.into();
        self
    }

    #[must_use]
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            debounce: DebounceSettings::default(),
            buffer_ttl: InMemoryArrivalStore::DEFAULT_TTL,
            decider: DeciderSettings::default(),
            fallback_reply: Self::DEFAULT_FALLBACK_REPLY.to_string(),
            history_window: Self::DEFAULT_HISTORY_WINDOW,
        }
    }
}

fn env_duration_ms(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let settings = RuntimeSettings::default();
        assert_eq!(
            settings.debounce.inactivity_threshold,
            DebounceSettings::DEFAULT_THRESHOLD
        );
        assert_eq!(settings.decider.retries, DeciderSettings::DEFAULT_RETRIES);
        assert_eq!(settings.history_window, 30);
        assert!(!settings.fallback_reply.is_empty());
    }

    #[test]
    fn builders_override_fields() {
        let settings = RuntimeSettings::default()
            .with_fallback_reply("be right back")
            .with_history_window(5)
            .with_decider(DeciderSettings {
                timeout: Duration::from_secs(5),
                retries: 0,
                backoff_base: Duration::from_millis(50),
            });
        assert_eq!(settings.fallback_reply, "be right back");
        assert_eq!(settings.history_window, 5);
        assert_eq!(settings.decider.retries, 0);
    }

    #[test]
    fn bad_env_values_fall_back() {
        // Parse helpers are what from_env leans on; drive them directly to
        // stay independent of ambient process env.
        assert_eq!(
            super::env_duration_ms("COLLOQUY_TEST_UNSET_VAR", Duration::from_millis(75)),
            Duration::from_millis(75)
        );
        assert_eq!(super::env_u32("COLLOQUY_TEST_UNSET_VAR", 4), 4);
    }
}
