//! Stateless policy checks over the instruction text of an event.

use hookgate_protocol::{
    HookEvent, HookIntent, PolicyViolation, Severity, SkillRequirement, ViolationKind,
};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::fields::{BODY_FIELDS, COMMAND, DESCRIPTION};
use crate::patterns::{PatternTable, RuleSpec};

/// Vocabulary that signals an agent quietly changing the requested work.
const FIDELITY_RULES: &[RuleSpec<()>] = &[
    ("simplify", r"\bsimplif(?:y|ied|ies|ying|ication)\b", ()),
    ("optimize", r"\boptimi[sz](?:e|ed|es|ing|ation)\b", ()),
    ("better", r"\bbetter\b", ()),
    ("simplificar", r"\bsimplific(?:ar|ado|ada|ando|a[çc][ãa]o)\b", ()),
    ("otimizar", r"\b(?:otimiz|optimiz)(?:ar|ado|ada|ando|a[çc][ãa]o)\b", ()),
    ("melhor", r"\bmelhor(?:ar|ado|ada|ia)?\b", ()),
];

/// One keyword rule of the skill table. Every pattern in `all_of` must
/// match for the rule to fire.
struct SkillSpec {
    skill_name: &'static str,
    strict: bool,
    reason: &'static str,
    all_of: &'static [&'static str],
}

const SKILL_RULES: &[SkillSpec] = &[
    SkillSpec {
        skill_name: "branching-scenario-builder",
        strict: true,
        reason: "interactive branching content",
        all_of: &[r"\binteractive\b|\binterativ[oa]s?\b", r"\bbranch(?:ing|es)?\b|\bramifica"],
    },
    SkillSpec {
        skill_name: "video-course-producer",
        strict: true,
        reason: "video course production",
        all_of: &[r"video[ -]?course|video lesson|curso em v[ií]deo|v[ií]deo[ -]?aula"],
    },
    SkillSpec {
        skill_name: "sales-letter-writer",
        strict: false,
        reason: "sales letter copywriting",
        all_of: &[r"sales[ -]letter|carta de vendas|\bvsl\b"],
    },
    SkillSpec {
        skill_name: "voice-agent-builder",
        strict: false,
        reason: "voice or phone agent",
        all_of: &[r"\bvoice\b|\bphone\b|\btelefon|\bvoz\b"],
    },
    SkillSpec {
        skill_name: "sales-pipeline-manager",
        strict: false,
        reason: "sales pipeline management",
        all_of: &[r"sales[ -]pipeline|pipeline de vendas|funil de vendas|\bcrm\b"],
    },
];

#[derive(Debug)]
struct SkillRule {
    skill_name: &'static str,
    strict: bool,
    reason: &'static str,
    all_of: Vec<Regex>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PolicyReport {
    pub violations: Vec<PolicyViolation>,
    pub skill_requirements: Vec<SkillRequirement>,
}

#[derive(Debug)]
pub struct PolicyValidator {
    fidelity: PatternTable<()>,
    skills: Vec<SkillRule>,
}

impl Default for PolicyValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyValidator {
    pub fn new() -> Self {
        let skills = SKILL_RULES
            .iter()
            .filter_map(|spec| {
                let all_of = spec
                    .all_of
                    .iter()
                    .map(|pattern| Regex::new(pattern))
                    .collect::<Result<Vec<_>, _>>();
                match all_of {
                    Ok(all_of) => Some(SkillRule {
                        skill_name: spec.skill_name,
                        strict: spec.strict,
                        reason: spec.reason,
                        all_of,
                    }),
                    Err(err) => {
                        warn!(skill = spec.skill_name, "skipping skill rule: {err}");
                        None
                    }
                }
            })
            .collect();

        Self {
            fidelity: PatternTable::compile(FIDELITY_RULES),
            skills,
        }
    }

    pub fn check(&self, event: &HookEvent) -> PolicyReport {
        let text = instruction_text(event);
        let mut report = PolicyReport::default();
        if text.is_empty() {
            return report;
        }

        if let Some(rule) = self.fidelity.first_match(&text) {
            report.violations.push(
                PolicyViolation::new(
                    ViolationKind::WorkflowFidelity,
                    Severity::High,
                    format!(
                        "Request wording (`{}`) suggests silently changing the planned work",
                        rule.name
                    ),
                )
                .with_suggestion(
                    "Implement the workflow as specified or record an approved deviation first",
                ),
            );
        }

        for skill in &self.skills {
            if !skill.all_of.iter().all(|regex| regex.is_match(&text)) {
                continue;
            }
            report.skill_requirements.push(SkillRequirement {
                skill_name: skill.skill_name.to_string(),
                strict: skill.strict,
                reason: format!("Detected {}", skill.reason),
                auto_mapped: true,
            });
            if skill.strict && event.intent() != HookIntent::Skill {
                report.violations.push(
                    PolicyViolation::new(
                        ViolationKind::SkillRequirement,
                        Severity::Low,
                        format!("Work on {} requires the `{}` skill", skill.reason, skill.skill_name),
                    )
                    .with_suggestion(format!("Invoke the `{}` skill", skill.skill_name)),
                );
            }
        }

        report
    }
}

/// Lowercased instruction text: description and command first, then every
/// other string input in key order, skipping file bodies.
fn instruction_text(event: &HookEvent) -> String {
    let leading = [DESCRIPTION, COMMAND];
    let mut parts: Vec<&str> = leading
        .iter()
        .filter_map(|key| event.input(key).and_then(Value::as_str))
        .collect();

    for (key, value) in &event.tool_input {
        if leading.contains(&key.as_str()) || BODY_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if let Value::String(value) = value {
            parts.push(value);
        }
    }

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
