//! Advisory hygiene checks on what the agent writes and runs.

use hookgate_protocol::HookEvent;
use regex::Regex;
use serde::Serialize;

use crate::fields::{self, COMMAND, FILE_PATH};
use crate::patterns::{PatternTable, RuleSpec};

const DEBUG_STATEMENT_RULES: &[RuleSpec<&str>] = &[
    ("console_log", r"\bconsole\.(?:log|debug|trace)\s*\(", "console.log"),
    ("debugger", r"\bdebugger\s*;", "debugger"),
    ("python_breakpoint", r"\b(?:breakpoint\(\)|pdb\.set_trace\(\))", "breakpoint()"),
    ("rust_dbg", r"\bdbg!\s*\(", "dbg!"),
    ("php_dump", r"\b(?:var_dump|print_r)\s*\(", "var_dump"),
];

/// Commands that usually keep running and are better left in a multiplexer.
const LONG_RUNNING_PREFIX: &str = r"^\s*(npm|docker|python3?|node)\b";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextQualityReport {
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ContextQualityReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.recommendations.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ContextQualityChecker {
    debug_statements: PatternTable<&'static str>,
    long_running: Option<Regex>,
}

impl Default for ContextQualityChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextQualityChecker {
    pub fn new() -> Self {
        Self {
            debug_statements: PatternTable::compile(DEBUG_STATEMENT_RULES),
            long_running: Regex::new(LONG_RUNNING_PREFIX).ok(),
        }
    }

    /// Malformed inputs yield an empty report; this check never fails.
    pub fn check(&self, event: &HookEvent) -> ContextQualityReport {
        let mut report = ContextQualityReport::default();

        if event.intent().is_file_mutation() {
            if let Ok(Some(written)) = fields::written_text(event) {
                let target = fields::str_field(event, FILE_PATH)
                    .ok()
                    .flatten()
                    .unwrap_or("file");
                for rule in self.debug_statements.matches(&written) {
                    report.issues.push(format!(
                        "Debug statement `{}` left in `{target}`",
                        rule.classification
                    ));
                }
            }
        }

        if let Ok(Some(command)) = fields::str_field(event, COMMAND) {
            let in_multiplexer = command.contains("tmux");
            if let Some(program) = self
                .long_running
                .as_ref()
                .and_then(|regex| regex.captures(command))
                .and_then(|caps| caps.get(1))
                .filter(|_| !in_multiplexer)
            {
                report.recommendations.push(format!(
                    "Run long-lived `{}` commands inside a tmux session",
                    program.as_str()
                ));
            }
        }

        report
    }
}
