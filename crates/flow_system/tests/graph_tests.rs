//! Integration tests for flow graphs, the flow manager and JSON storage

use std::sync::Arc;

use chat_core::{ConversationTree, MessageValue};
use flow_system::{
    FlowError, FlowGraph, FlowManager, FlowStorage, JsonFileStorage, StepRegistry, DEFAULT_OUTPUT,
};
use serde_json::json;
use tempfile::tempdir;

#[test]
fn test_add_step_seeds_default_data() {
    let registry = StepRegistry::with_builtin_steps();
    let mut graph = FlowGraph::new("demo");
    let id = graph.add_step("consolidator", 10.0, 20.0, &registry).unwrap();

    let step = graph.step(&id).unwrap();
    assert_eq!(step.data["clearFrom"], 1);
    assert_eq!(step.data["onlyLastAnswer"], false);
    assert_eq!((step.x, step.y), (10.0, 20.0));

    let err = graph.add_step("teleport", 0.0, 0.0, &registry).unwrap_err();
    assert!(matches!(err, FlowError::UnknownStepType(name) if name == "teleport"));
}

#[test]
fn test_validate_catches_structural_problems() {
    let registry = StepRegistry::with_builtin_steps();
    let mut graph = FlowGraph::new("demo");
    let branch = graph.add_step("branch", 0.0, 0.0, &registry).unwrap();
    let prompt = graph.add_step("simple-prompt", 0.0, 100.0, &registry).unwrap();
    graph.connect(&branch, &prompt, "pass").unwrap();
    graph.validate(&registry).unwrap();

    let mut wrong_output = graph.clone();
    wrong_output.connect(&prompt, &branch, "pass").unwrap();
    assert!(matches!(
        wrong_output.validate(&registry),
        Err(FlowError::UnknownOutput { .. })
    ));

    let mut unknown_type = graph.clone();
    unknown_type.step_mut(&prompt).unwrap().step_type = "mystery".into();
    assert!(matches!(
        unknown_type.validate(&registry),
        Err(FlowError::UnknownStepType(_))
    ));

    let mut dangling = graph.clone();
    dangling.steps.retain(|s| s.id != prompt);
    assert!(matches!(
        dangling.validate(&registry),
        Err(FlowError::DanglingConnection { .. })
    ));

    let mut two_roots = graph.clone();
    two_roots.disconnect(&branch, "pass").unwrap();
    assert!(matches!(
        two_roots.validate(&registry),
        Err(FlowError::AmbiguousStart(_))
    ));
}

#[tokio::test]
async fn test_manager_round_trip_through_storage() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(JsonFileStorage::new(dir.path().join("flows")));
    let registry = StepRegistry::with_builtin_steps();

    let mut manager = FlowManager::new(storage.clone());
    let id = manager.create_flow("Review loop").await.unwrap();
    manager
        .update(&id, |flow| {
            let a = flow.add_step("simple-prompt", 0.0, 0.0, &registry).unwrap();
            let b = flow.add_step("echo-answer", 0.0, 120.0, &registry).unwrap();
            flow.update_step_data(&a, json!({"prompt": "Draft it"}));
            flow.connect(&a, &b, DEFAULT_OUTPUT).unwrap();
        })
        .await
        .unwrap();
    manager.create_flow("Another").await.unwrap();

    let mut reloaded = FlowManager::new(storage.clone());
    assert_eq!(reloaded.load_all().await.unwrap(), 2);
    let names: Vec<&str> = reloaded.list().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Another", "Review loop"]);

    let flow = reloaded.get(&id).unwrap();
    assert_eq!(flow, manager.get(&id).unwrap());
    assert_eq!(flow.start_step().unwrap().data["prompt"], "Draft it");
    flow.validate(&registry).unwrap();
}

#[tokio::test]
async fn test_manager_rename_delete_and_import() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(JsonFileStorage::new(dir.path()));
    let mut manager = FlowManager::new(storage.clone());

    let id = manager.create_flow("Draft").await.unwrap();
    manager.rename(&id, "Final").await.unwrap();
    assert_eq!(
        storage.load_flow(&id).await.unwrap().unwrap().name,
        "Final"
    );

    let imported = FlowGraph::from_json(
        r#"{"id": "imported", "name": "Imported", "steps": [], "connections": []}"#,
    )
    .unwrap();
    let imported_id = manager.add_flow_from_data(imported).await.unwrap();
    assert_eq!(imported_id.as_str(), "imported");
    assert_eq!(manager.list().len(), 2);

    assert!(manager.delete(&id).await.unwrap());
    assert!(!manager.delete(&id).await.unwrap());
    assert!(storage.load_flow(&id).await.unwrap().is_none());

    let err = manager.rename(&"missing".into(), "x").await.unwrap_err();
    assert!(matches!(err, FlowError::FlowNotFound(_)));
}

#[tokio::test]
async fn test_tree_snapshots_are_stored_beside_flows() {
    let dir = tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());

    let mut tree = ConversationTree::new();
    tree.add_message(MessageValue::user("hi"));
    let answer = tree.add_message(MessageValue::assistant("hello"));
    tree.add_alternative(answer, MessageValue::assistant("hey"));
    storage.save_tree(&tree).await.unwrap();
    storage.save_flow(&FlowGraph::new("only flow")).await.unwrap();

    let loaded = storage.load_tree(tree.id()).await.unwrap().unwrap();
    assert_eq!(loaded.id(), tree.id());
    assert_eq!(loaded.active_path_values(), tree.active_path_values());
    assert_eq!(loaded.leaf_count(), 2);

    // Tree files are not mistaken for flows.
    assert_eq!(storage.load_flows().await.unwrap().len(), 1);
    assert!(storage
        .load_tree(ConversationTree::new().id())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_missing_directory_loads_nothing() {
    let dir = tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path().join("not-created"));
    assert!(storage.load_flows().await.unwrap().is_empty());
    assert!(!storage.delete_flow(&"x".into()).await.unwrap());
}

#[tokio::test]
async fn test_flow_ids_cannot_leave_the_data_directory() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let storage = Arc::new(JsonFileStorage::new(&data));
    let mut manager = FlowManager::new(storage.clone());

    let absolute = dir.path().join("absolute").display().to_string();
    for id in ["../escaped", "nested/flow", "..", ".hidden", "", absolute.as_str()] {
        let flow = FlowGraph::from_json(&format!(
            r#"{{"id": {}, "name": "Bad", "steps": [], "connections": []}}"#,
            json!(id)
        ))
        .unwrap();
        let err = manager.add_flow_from_data(flow).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidFlowId(_)), "{id}: {err}");
        assert!(storage.load_flow(&id.into()).await.is_err());
    }

    assert!(!dir.path().join("escaped.json").exists());
    assert!(!dir.path().join("absolute.json").exists());
    assert!(manager.list().is_empty());
    assert!(storage.load_flows().await.unwrap().is_empty());
}
