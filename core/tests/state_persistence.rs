use std::fs;
use std::sync::Arc;

use hookgate_core::observability::{LAST_UPDATED_KEY, StatePersistence};
use hookgate_core::{FileWorkflowStateStore, GateConfig, HookPipeline, WorkflowStateStore};
use hookgate_protocol::{HookDecision, HookEvent, HookPhase, ViolationKind};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::tempdir;

fn write_json(path: &std::path::Path, value: Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

#[tokio::test]
async fn reads_are_recorded_and_satisfy_later_edits() {
    let temp = tempdir().unwrap();
    let config = GateConfig::for_project(temp.path());
    let state_path = config.resolved_state_path();
    write_json(
        &state_path,
        json!({"phase": "implementation", "evidence": {"read_log": [], "notes": "keep me"}}),
    );
    fs::create_dir_all(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src/app.ts"), "export {}\n").unwrap();
    let pipeline = HookPipeline::with_file_store(config);

    let edit = HookEvent::pre_tool_use("Edit")
        .with_cwd(temp.path())
        .with_input("file_path", "src/app.ts")
        .with_input("old_string", "export {}")
        .with_input("new_string", "export const ready = true;");
    let before = pipeline.evaluate(&edit);
    assert_eq!(before.decision, HookDecision::Warning);

    let read = pipeline.evaluate(
        &HookEvent::pre_tool_use("Read")
            .with_cwd(temp.path())
            .with_input("file_path", "src/app.ts"),
    );
    assert_eq!(read.decision, HookDecision::Allow);
    pipeline.flush_metrics().await;

    let stored: Value = serde_json::from_str(&fs::read_to_string(&state_path).unwrap()).unwrap();
    let resolved = temp.path().join("src/app.ts").to_string_lossy().into_owned();
    assert_eq!(stored["evidence"]["read_log"], json!(["src/app.ts", resolved]));
    assert_eq!(stored["evidence"]["notes"], "keep me");
    assert_eq!(stored["phase"], "implementation");
    assert!(stored[LAST_UPDATED_KEY].is_string());

    let after = pipeline.evaluate(&edit);
    assert_eq!(after.decision, HookDecision::Allow);
    assert!(
        !after
            .validation
            .unwrap()
            .violations
            .iter()
            .any(|violation| violation.kind == ViolationKind::ReadBeforeWrite)
    );
}

#[tokio::test]
async fn relative_read_satisfies_an_absolute_edit() {
    let temp = tempdir().unwrap();
    let config = GateConfig::for_project(temp.path());
    write_json(&config.resolved_state_path(), json!({"evidence": {"read_log": []}}));
    let target = temp.path().join("service.ts");
    fs::write(&target, "export const port = 80;\n").unwrap();
    let pipeline = HookPipeline::with_file_store(config);

    pipeline.evaluate(
        &HookEvent::pre_tool_use("Read")
            .with_cwd(temp.path())
            .with_input("file_path", "service.ts"),
    );
    pipeline.flush_metrics().await;

    let edit = HookEvent::pre_tool_use("Edit")
        .with_cwd(temp.path())
        .with_input("file_path", target.to_string_lossy().to_string())
        .with_input("old_string", "80")
        .with_input("new_string", "8080");
    let result = pipeline.evaluate(&edit);
    assert_eq!(result.decision, HookDecision::Allow);
    assert!(result.validation.unwrap().violations.is_empty());
}

#[tokio::test]
async fn reads_without_an_active_workflow_leave_no_state_behind() {
    let temp = tempdir().unwrap();
    let config = GateConfig::for_project(temp.path());
    let state_path = config.resolved_state_path();
    let pipeline = HookPipeline::with_file_store(config);

    pipeline.evaluate(&HookEvent::pre_tool_use("Read").with_input("file_path", "README.md"));
    pipeline.flush_metrics().await;

    assert!(!state_path.exists());
}

#[tokio::test]
async fn handoff_is_stamped_after_state_changes_and_on_stop() {
    let temp = tempdir().unwrap();
    let config = GateConfig::for_project(temp.path());
    let handoff_path = config.resolved_handoff_path();
    write_json(&config.resolved_state_path(), json!({"evidence": {}}));
    fs::write(&handoff_path, "# Session\n- Last Updated: never\n\nOpaque body.\n").unwrap();
    let pipeline = HookPipeline::with_file_store(config);

    pipeline.evaluate(&HookEvent::pre_tool_use("Read").with_input("file_path", "lib.rs"));
    pipeline.flush_metrics().await;
    let stamped = fs::read_to_string(&handoff_path).unwrap();
    assert!(!stamped.contains("never"));
    assert!(stamped.starts_with("# Session\n- Last Updated: "));
    assert!(stamped.ends_with("\n\nOpaque body.\n"));

    fs::write(&handoff_path, "# Session\n- Last Updated: never\n").unwrap();
    pipeline.evaluate(&HookEvent::new("Bash", HookPhase::Stop).with_input("command", "true"));
    pipeline.flush_metrics().await;
    assert!(!fs::read_to_string(&handoff_path).unwrap().contains("never"));
}

#[test]
fn explicit_updates_merge_shallowly_into_the_file() {
    let temp = tempdir().unwrap();
    let state_path = temp.path().join("state.json");
    write_json(
        &state_path,
        json!({
            "baseline": {"files": {"a.sql": true}, "commit": "abc"},
            "evidence": {"read_log": ["a.ts"], "approved_deviations": []}
        }),
    );
    let store = Arc::new(FileWorkflowStateStore::new(&state_path));
    let persistence = StatePersistence::new(store.clone(), temp.path().join("HANDOFF.md"));

    let partial = json!({
        "baseline": {"files": {"b.sql": true}},
        "evidence": {"approved_deviations": [{"deviation": "newfile: b.ts", "reason": "ok"}]}
    });
    persistence
        .update(partial.as_object().unwrap().clone())
        .unwrap();

    let state = store.load().unwrap().unwrap();
    assert_eq!(state.baseline.files.keys().collect::<Vec<_>>(), vec!["b.sql"]);
    assert!(state.baseline.extra.is_empty());
    assert_eq!(state.evidence.read_log, vec!["a.ts".to_string()]);
    assert!(state.approves_creation_of("b.ts"));
}
