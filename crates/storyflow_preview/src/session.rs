// SPDX-License-Identifier: MIT OR Apache-2.0
//! Line-oriented dry run of an event graph.

use std::io::{self, BufRead, Write};
use storyflow_graph::runner::expr::display_value;
use storyflow_graph::EventRunner;

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The walk reached an End node or an empty link
    Finished,
    /// The runner recorded errors
    Stuck,
    /// The user quit, or input ran out
    Quit,
    /// A Choice node had nothing to offer
    DeadEnd,
}

/// Drive `runner` from `input`, echoing text and choices to `output`.
///
/// A number picks that choice, a blank line continues past text and `q`
/// quits. The runner must already be started.
pub fn run_session(runner: &mut EventRunner<'_>, mut input: impl BufRead, mut output: impl Write) -> io::Result<Outcome> {
    let outcome = loop {
        show(runner, &mut output)?;

        if runner.is_stuck() {
            for err in runner.errors() {
                writeln!(output, "error: {err}")?;
            }
            break Outcome::Stuck;
        }
        if runner.is_finished() {
            writeln!(output, "-- end --")?;
            break Outcome::Finished;
        }
        let waiting_on_choice = runner.display_choices().is_empty()
            && runner
                .current_node()
                .is_some_and(|n| n.kind() == storyflow_graph::NodeKind::Choice);
        if waiting_on_choice {
            writeln!(output, "-- no choices available --")?;
            break Outcome::DeadEnd;
        }

        let Some(line) = read_command(&mut input, &mut output)? else {
            break Outcome::Quit;
        };
        match line.as_str() {
            "q" | "quit" => break Outcome::Quit,
            "" if runner.display_choices().is_empty() => runner.proceed(),
            text => match text.parse::<usize>() {
                Ok(n) if n >= 1 => {
                    if let Err(err) = runner.choose(n - 1) {
                        writeln!(output, "{err}")?;
                    }
                }
                _ => writeln!(output, "enter a choice number, or q to quit")?,
            },
        }
    };

    writeln!(output, "storage:")?;
    for (key, value) in runner.storage().as_map() {
        writeln!(output, "  {key} = {}", display_value(value))?;
    }
    output.flush()?;
    Ok(outcome)
}

fn show(runner: &EventRunner<'_>, output: &mut impl Write) -> io::Result<()> {
    if !runner.display_text().is_empty() {
        writeln!(output, "{}", runner.display_text())?;
    }
    for (i, choice) in runner.display_choices().iter().enumerate() {
        writeln!(output, "  {}. {}", i + 1, choice.text)?;
    }
    Ok(())
}

fn read_command(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Option<String>> {
    write!(output, "> ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use storyflow_graph::node::{ChoiceEntry, ChoiceNode, ExecNode};
    use storyflow_graph::{Graph, Node, NodeBody, NodeId, Storage};

    fn dialogue() -> Graph {
        let mut graph = Graph::new("talk");
        graph
            .add_node(Node::new(
                "root",
                NodeBody::Exec(ExecNode {
                    text: "Hello traveller".to_string(),
                    action_script: "SET_NUM(met, 1)".to_string(),
                    next: Some(NodeId::new("ask")),
                }),
            ))
            .unwrap();
        graph
            .add_node(Node::new(
                "ask",
                NodeBody::Choice(ChoiceNode {
                    prompt_text: "Buy a sword?".to_string(),
                    choices: vec![
                        ChoiceEntry {
                            eval_str: "SET_BOOL(sword, true)".to_string(),
                            prefix_text: "Sold!".to_string(),
                            next: Some(NodeId::new("end")),
                            ..ChoiceEntry::new("Yes")
                        },
                        ChoiceEntry {
                            next: Some(NodeId::new("end")),
                            ..ChoiceEntry::new("No")
                        },
                    ],
                }),
            ))
            .unwrap();
        graph.add_node(Node::new("end", NodeBody::End)).unwrap();
        graph
    }

    fn run(graph: &Graph, input: &str) -> (Outcome, String, Storage) {
        let mut runner = EventRunner::new(graph, Storage::new());
        runner.start();
        let mut out = Vec::new();
        let outcome = run_session(&mut runner, Cursor::new(input.to_string()), &mut out).unwrap();
        (outcome, String::from_utf8(out).unwrap(), runner.into_storage())
    }

    #[test]
    fn test_walk_to_end() {
        let graph = dialogue();
        let (outcome, out, storage) = run(&graph, "\n1\n");
        assert_eq!(outcome, Outcome::Finished);
        assert!(out.contains("Hello traveller"));
        assert!(out.contains("  1. Yes"));
        assert!(out.contains("Sold!"));
        assert!(out.contains("-- end --"));
        assert_eq!(storage.get("sword"), Some(&json!(true)));
        assert_eq!(storage.get("met"), Some(&json!(1)));
    }

    #[test]
    fn test_quit_and_eof() {
        let graph = dialogue();
        assert_eq!(run(&graph, "q\n").0, Outcome::Quit);
        assert_eq!(run(&graph, "").0, Outcome::Quit);
    }

    #[test]
    fn test_bad_input_reprompts() {
        let graph = dialogue();
        let (outcome, out, _) = run(&graph, "\nabc\n7\n2\n");
        assert_eq!(outcome, Outcome::Finished);
        assert!(out.contains("enter a choice number"));
        assert!(out.contains("No choice 6 is on display"));
    }

    #[test]
    fn test_stuck_reports_errors() {
        let mut graph = Graph::new("broken");
        graph
            .add_node(Node::new(
                "root",
                NodeBody::Exec(ExecNode {
                    text: "x".to_string(),
                    action_script: "EXPLODE(now)".to_string(),
                    next: None,
                }),
            ))
            .unwrap();
        let (outcome, out, _) = run(&graph, "");
        assert_eq!(outcome, Outcome::Stuck);
        assert!(out.contains("error: [root]"));
    }

    #[test]
    fn test_dead_end_choice() {
        let mut graph = Graph::new("empty");
        graph
            .add_node(Node::new(
                "root",
                NodeBody::Choice(ChoiceNode {
                    prompt_text: "Nothing here".to_string(),
                    choices: vec![ChoiceEntry {
                        condition_str: "IS(never)".to_string(),
                        ..ChoiceEntry::new("hidden")
                    }],
                }),
            ))
            .unwrap();
        let (outcome, _, _) = run(&graph, "");
        assert_eq!(outcome, Outcome::DeadEnd);
    }
}
