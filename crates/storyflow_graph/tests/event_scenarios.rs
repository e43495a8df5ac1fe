// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end runs of small event graphs.

use serde_json::json;
use storyflow_graph::node::{ChoiceEntry, ChoiceNode, ExecNode, SwitchCase, SwitchNode};
use storyflow_graph::runner::expr::{eval_condition, exec_action};
use storyflow_graph::{validate, EventRunner, Graph, GraphDocument, Node, NodeBody, NodeId, Storage};

fn graph_of(nodes: Vec<Node>) -> Graph {
    let mut graph = Graph::new("scenario");
    for node in nodes {
        graph.add_node(node).unwrap();
    }
    graph
}

fn storage(value: serde_json::Value) -> Storage {
    Storage::from_value(value).unwrap()
}

#[test]
fn test_exec_auto_advance() {
    let graph = graph_of(vec![
        Node::new(
            "root",
            NodeBody::Exec(ExecNode {
                text: String::new(),
                action_script: "SET_NUM(x,1)".to_string(),
                next: Some(NodeId::new("root2")),
            }),
        ),
        Node::new("root2", NodeBody::End),
    ]);

    let mut runner = EventRunner::new(&graph, Storage::new());
    runner.start();

    assert_eq!(runner.current_node_id().map(NodeId::as_str), Some("root2"));
    assert_eq!(runner.storage().get("x"), Some(&json!(1)));
    assert_eq!(runner.display_text(), "");
    assert!(runner.is_finished());
    assert!(runner.errors().is_empty());
}

#[test]
fn test_choice_filtering() {
    let graph = graph_of(vec![
        Node::new(
            "root",
            NodeBody::Choice(ChoiceNode {
                prompt_text: "Which way?".to_string(),
                choices: vec![
                    ChoiceEntry {
                        condition_str: "EQ(a,b)".to_string(),
                        next: Some(NodeId::new("end")),
                        ..ChoiceEntry::new("Hidden")
                    },
                    ChoiceEntry {
                        next: Some(NodeId::new("end")),
                        ..ChoiceEntry::new("Always")
                    },
                ],
            }),
        ),
        Node::new("end", NodeBody::End),
    ]);

    let mut runner = EventRunner::new(&graph, storage(json!({"a": 1, "b": 2})));
    runner.start();

    let shown: Vec<&str> = runner.display_choices().iter().map(|c| c.text.as_str()).collect();
    assert_eq!(shown, vec!["Always"]);
    assert_eq!(runner.display_choices()[0].index, 1);
    assert_eq!(runner.display_text(), "Which way?");
    assert!(!runner.is_finished());

    let next = runner.display_choices()[0].next.clone();
    runner.advance(next.as_ref());
    assert!(runner.is_finished());
}

#[test]
fn test_switch_fallback() {
    let graph = graph_of(vec![
        Node::new(
            "root",
            NodeBody::Switch(SwitchNode {
                cases: vec![SwitchCase {
                    condition_str: "GT(a, 10)".to_string(),
                    next: Some(NodeId::new("never")),
                }],
                default_next: Some(NodeId::new("end")),
            }),
        ),
        Node::new(
            "never",
            NodeBody::Exec(ExecNode {
                text: "unreachable".to_string(),
                ..ExecNode::default()
            }),
        ),
        Node::new("end", NodeBody::End),
    ]);

    let mut runner = EventRunner::new(&graph, storage(json!({"a": 3})));
    runner.start();
    assert_eq!(runner.current_node_id().map(NodeId::as_str), Some("end"));
    assert!(runner.is_finished());
}

#[test]
fn test_validator_properties() {
    let unlinked = graph_of(vec![Node::new("a", NodeBody::Exec(ExecNode::default()))]);
    assert_eq!(validate(&unlinked).len(), 1);

    let linked = graph_of(vec![
        Node::new(
            "s",
            NodeBody::Switch(SwitchNode {
                cases: vec![SwitchCase {
                    condition_str: "IS(x)".to_string(),
                    next: Some(NodeId::new("e")),
                }],
                default_next: Some(NodeId::new("e")),
            }),
        ),
        Node::new("e", NodeBody::End),
    ]);
    assert!(validate(&linked).is_empty());
}

#[test]
fn test_expression_properties() {
    let s = storage(json!({"a": 5, "b": 5}));
    assert_eq!(eval_condition("EQ(a,b)", &s), Ok(true));

    let s = storage(json!({"a": 3, "b": 5}));
    assert_eq!(eval_condition("GT(a,b)", &s), Ok(false));
    assert!(eval_condition("FOO(x)", &s).is_err());

    let mut s = storage(json!({"score": 5}));
    exec_action("MOD(score, 10)", &mut s).unwrap();
    assert_eq!(s.get("score"), Some(&json!(15)));

    let mut s = Storage::new();
    exec_action("SET_BOOL(flag, true)", &mut s).unwrap();
    assert_eq!(s.get("flag"), Some(&json!(true)));
    assert!(exec_action("SET_BOOL(flag, maybe)", &mut s).is_err());
    assert_eq!(s.get("flag"), Some(&json!(true)));
}

#[test]
fn test_condition_error_hides_choice_and_halts() {
    let graph = graph_of(vec![
        Node::new(
            "root",
            NodeBody::Choice(ChoiceNode {
                prompt_text: String::new(),
                choices: vec![
                    ChoiceEntry {
                        condition_str: "FOO(x)".to_string(),
                        ..ChoiceEntry::new("broken")
                    },
                    ChoiceEntry::new("fine"),
                ],
            }),
        ),
    ]);
    let mut runner = EventRunner::new(&graph, Storage::new());
    runner.start();
    assert_eq!(runner.display_choices().len(), 1);
    assert!(runner.is_stuck());
    assert!(runner.choose(0).is_err());
}

#[test]
fn test_document_json_shape_roundtrip() {
    let text = r#"{
        "name": "fixture",
        "nodes": [
            {"id": "root", "x": 10, "y": 20, "h": 56, "kind": "exec",
             "text": "Hi @hero", "actionScript": "", "next": "pick"},
            {"id": "pick", "x": 300, "y": 20, "h": 90, "kind": "choice", "promptText": "",
             "choices": [{"text": "Go", "conditionStr": "", "evalStr": "", "prefixText": "", "next": ""}]},
            {"id": "note", "x": 0, "y": 200, "h": 40, "kind": "comment", "text": "todo"},
            {"id": "end", "x": 600, "y": 20, "h": 40, "kind": "end"}
        ],
        "variables": [{"key": "hero", "value": "Aria", "importFrom": ""}]
    }"#;

    let doc: GraphDocument = serde_json::from_str(text).unwrap();
    let graph = Graph::from_document(doc.clone()).unwrap();
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.node("pick").unwrap().exits(), vec![None]);

    // Heights are recomputed from content, everything else survives as read
    assert_eq!(graph.node("pick").unwrap().h, 56.0);
    assert_eq!(graph.node("note").unwrap().h, 56.0);
    let written = serde_json::to_string(&graph.to_document()).unwrap();
    let reread: GraphDocument = serde_json::from_str(&written).unwrap();
    assert_eq!(reread, graph.to_document());
    for (before, after) in doc.nodes.iter().zip(&reread.nodes) {
        assert_eq!((&before.id, before.x, before.y, &before.body), (&after.id, after.x, after.y, &after.body));
    }
    assert_eq!(reread.variables, doc.variables);
}
