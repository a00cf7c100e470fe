use hookgate_protocol::{SecurityThreat, Severity, ThreatCategory};

use super::ThreatClass;
use super::injection::collect;
use crate::patterns::{PatternTable, RuleSpec};

const fn secret(description: &'static str) -> ThreatClass {
    ThreatClass {
        category: ThreatCategory::SecretLeakage,
        severity: Severity::Critical,
        description,
    }
}

/// Provider credential formats. Each row reports separately, so one text can
/// leak several kinds of key.
const SECRET_RULES: &[RuleSpec<ThreatClass>] = &[
    ("anthropic_api_key", r"sk-ant-[A-Za-z0-9_\-]{20,}", secret("Anthropic API key")),
    ("openai_api_key", r"\bsk-(?:proj-)?[A-Za-z0-9]{20,}", secret("OpenAI API key")),
    ("google_api_key", r"\bAIza[0-9A-Za-z_\-]{35}", secret("Google API key")),
    ("mailchimp_api_key", r"\b[0-9a-f]{32}-us[0-9]{1,2}\b", secret("Mailchimp API key")),
    ("slack_token", r"\bxox[baprs]-[0-9A-Za-z\-]{10,}", secret("Slack token")),
    ("github_pat", r"\bghp_[0-9A-Za-z]{36}\b", secret("GitHub personal access token")),
    (
        "github_fine_grained_pat",
        r"\bgithub_pat_[0-9A-Za-z_]{22,}",
        secret("GitHub fine-grained access token"),
    ),
];

#[derive(Debug, Clone)]
pub struct SecretScanner {
    table: PatternTable<ThreatClass>,
}

impl Default for SecretScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretScanner {
    pub fn new() -> Self {
        Self {
            table: PatternTable::compile(SECRET_RULES),
        }
    }

    pub fn scan(&self, text: &str) -> Vec<SecurityThreat> {
        collect(&self.table, text)
    }
}
