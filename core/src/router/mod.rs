//! Layer 1: intent routing and fast-path decisions.
//!
//! The router maps the tool name to a [`HookIntent`], then walks a fixed,
//! first-match-wins rule list to decide whether the event can be let through
//! without the heavier layers. Verdicts are cached per tool and target so
//! identical repeats inside the TTL window skip rule evaluation entirely.

mod allow_list;

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use hookgate_protocol::{GateLayer, HookEvent, HookIntent, RouteResult};
use serde::Serialize;
use tracing::debug;

pub use allow_list::{ReadOnlyCommandAllowList, SafeFileAllowList};

use crate::cache::TtlLruCache;
use crate::config::GateConfig;
use crate::elapsed_ms;
use crate::error::GateError;
use crate::fields::{self, COMMAND, FILE_PATH, PATTERN};

/// Cached part of a routing verdict; timing and the hit flag are filled in
/// per call.
#[derive(Debug, Clone, PartialEq)]
struct RouteVerdict {
    intent: HookIntent,
    allow: bool,
    skip_layers: BTreeSet<GateLayer>,
    reason: Option<String>,
    rule: &'static str,
}

impl RouteVerdict {
    fn new(intent: HookIntent, allow: bool, rule: &'static str, skip: &[GateLayer]) -> Self {
        Self {
            intent,
            allow,
            skip_layers: skip.iter().copied().collect(),
            reason: None,
            rule,
        }
    }

    fn into_result(self, cache_hit: bool, processing_time_ms: f64) -> RouteResult {
        RouteResult {
            intent: self.intent,
            allow: self.allow,
            skip_layers: self.skip_layers,
            reason: self.reason,
            rule: self.rule.to_string(),
            cache_hit,
            processing_time_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStats {
    pub cache_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[derive(Debug)]
pub struct IntentRouter {
    cache: Mutex<TtlLruCache<String, RouteVerdict>>,
    hits: AtomicU64,
    misses: AtomicU64,
    safe_files: SafeFileAllowList,
    read_only_commands: ReadOnlyCommandAllowList,
    blocked_tools: HashSet<String>,
}

impl IntentRouter {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            cache: Mutex::new(TtlLruCache::new(
                config.cache_max_entries,
                config.cache_ttl(),
            )),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            safe_files: SafeFileAllowList::new(&config.safe_file_globs),
            read_only_commands: ReadOnlyCommandAllowList::new(&config.read_only_commands),
            blocked_tools: config.blocked_tools.iter().cloned().collect(),
        }
    }

    pub fn route(&self, event: &HookEvent) -> Result<RouteResult, GateError> {
        let started = Instant::now();
        let key = cache_key(event)?;

        if let Some(verdict) = self.lock_cache().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(%key, rule = verdict.rule, "route cache hit");
            return Ok(verdict.into_result(true, elapsed_ms(started)));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let verdict = self.evaluate_rules(event)?;
        debug!(%key, rule = verdict.rule, allow = verdict.allow, "route evaluated");
        self.lock_cache().set(key, verdict.clone());
        Ok(verdict.into_result(false, elapsed_ms(started)))
    }

    pub fn stats(&self) -> RouterStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        RouterStats {
            cache_size: self.lock_cache().len(),
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    /// Drops expired verdicts ahead of the lazy read-path eviction.
    pub fn cleanup(&self) -> usize {
        self.lock_cache().cleanup()
    }

    fn evaluate_rules(&self, event: &HookEvent) -> Result<RouteVerdict, GateError> {
        use GateLayer::{Security, Validation};

        let intent = event.intent();

        if self.blocked_tools.contains(&event.tool_name) {
            let mut verdict = RouteVerdict::new(intent, false, "blocked_tool", &[]);
            verdict.reason = Some(format!(
                "Tool `{}` is blocked by hookgate configuration",
                event.tool_name
            ));
            return Ok(verdict);
        }

        let verdict = match intent {
            HookIntent::Read => RouteVerdict::new(intent, true, "read", &[Validation, Security]),
            HookIntent::Glob | HookIntent::Grep => {
                RouteVerdict::new(intent, true, "search", &[Validation, Security])
            }
            HookIntent::Write | HookIntent::Edit
                if fields::str_field(event, FILE_PATH)?
                    .is_some_and(|path| self.safe_files.matches(path)) =>
            {
                RouteVerdict::new(intent, true, "safe_file", &[Security])
            }
            HookIntent::Bash
                if fields::str_field(event, COMMAND)?
                    .is_some_and(|command| self.read_only_commands.matches(command)) =>
            {
                RouteVerdict::new(intent, true, "read_only_command", &[Validation, Security])
            }
            HookIntent::Skill => RouteVerdict::new(intent, false, "skill_deferred", &[Security]),
            _ => RouteVerdict::new(intent, false, "full_validation", &[]),
        };
        Ok(verdict)
    }

    fn lock_cache(&self) -> MutexGuard<'_, TtlLruCache<String, RouteVerdict>> {
        // The cache stays structurally valid if a holder panicked.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn cache_key(event: &HookEvent) -> Result<String, GateError> {
    let target = fields::first_str_field(event, &[FILE_PATH, COMMAND, PATTERN])?.unwrap_or("");
    Ok(format!("{}:{}", event.tool_name, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread::sleep;
    use std::time::Duration;

    fn router() -> IntentRouter {
        IntentRouter::new(&GateConfig::default())
    }

    #[test]
    fn reads_and_searches_skip_validation_and_security() {
        let router = router();
        for tool in ["Read", "Glob", "Grep"] {
            let event = HookEvent::pre_tool_use(tool).with_input(FILE_PATH, "src/lib.rs");
            let result = router.route(&event).unwrap();
            assert!(result.allow, "{tool} should be fast-pathed");
            assert!(result.skips(GateLayer::Validation));
            assert!(result.skips(GateLayer::Security));
        }
    }

    #[test]
    fn safe_file_write_still_runs_validation() {
        let event = HookEvent::pre_tool_use("Write").with_input(FILE_PATH, "docs/notes.md");
        let result = router().route(&event).unwrap();

        assert_eq!(result.rule, "safe_file");
        assert!(result.allow);
        assert!(!result.skips(GateLayer::Validation));
        assert!(result.skips(GateLayer::Security));
    }

    #[test]
    fn skill_is_deferred_without_a_reason() {
        let event = HookEvent::pre_tool_use("Skill").with_input("skill", "video-course-producer");
        let result = router().route(&event).unwrap();

        assert!(!result.allow);
        assert!(!result.is_denied());
        assert_eq!(result.reason, None);
        assert_eq!(
            result.skip_layers,
            BTreeSet::from([GateLayer::Security])
        );
    }

    #[test]
    fn unmatched_events_need_full_validation() {
        let event = HookEvent::pre_tool_use("Bash").with_input(COMMAND, "cargo build");
        let result = router().route(&event).unwrap();

        assert_eq!(result.rule, "full_validation");
        assert!(!result.allow);
        assert!(result.skip_layers.is_empty());
    }

    #[test]
    fn blocked_tools_are_denied_with_reason() {
        let config = GateConfig {
            blocked_tools: vec!["WebFetch".to_string()],
            ..GateConfig::default()
        };
        let router = IntentRouter::new(&config);
        let result = router
            .route(&HookEvent::pre_tool_use("WebFetch"))
            .unwrap();

        assert!(result.is_denied());
        assert_eq!(result.intent, HookIntent::Unknown);
    }

    #[test]
    fn repeats_hit_the_cache_until_ttl_expires() {
        let config = GateConfig {
            cache_ttl_ms: 40,
            ..GateConfig::default()
        };
        let router = IntentRouter::new(&config);
        let event = HookEvent::pre_tool_use("Bash").with_input(COMMAND, "ls -la");

        let first = router.route(&event).unwrap();
        let second = router.route(&event).unwrap();
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.skip_layers, second.skip_layers);
        assert_eq!(first.allow, second.allow);

        sleep(Duration::from_millis(80));
        let third = router.route(&event).unwrap();
        assert!(!third.cache_hit);

        let stats = router.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.cache_size, 1);
    }

    #[test]
    fn cache_key_uses_first_present_target() {
        let event = HookEvent::pre_tool_use("Grep")
            .with_input(FILE_PATH, "")
            .with_input(PATTERN, "TODO");
        assert_eq!(cache_key(&event).unwrap(), "Grep:TODO");
        assert_eq!(
            cache_key(&HookEvent::pre_tool_use("Skill")).unwrap(),
            "Skill:"
        );
    }
}
