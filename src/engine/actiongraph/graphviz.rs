use std::{fmt::Write, path::Path};

use petgraph::visit::EdgeRef;

use osutils::files;
use strata_api::{
    error::{CommitError, ReportError, StorageError},
    text::Tense,
};

use super::{action::ActionKind, Actiongraph};

fn color(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Create | ActionKind::Mount | ActionKind::AddToEtcFstab => "green",
        ActionKind::Delete | ActionKind::Unmount | ActionKind::RemoveFromEtcFstab => "red",
        _ => "blue",
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Actiongraph<'_> {
    /// Renders the actiongraph in the dot language. Nodes are labeled with
    /// the action text, edges point from an action to the ones waiting for it.
    pub fn to_graphviz(&self) -> Result<String, StorageError> {
        let mut out = String::from("digraph actiongraph {\n    node [shape=box];\n");

        for (position, vertex) in self.order.iter().enumerate() {
            let action = &self.graph[*vertex];
            let text = action.text(self, Tense::Simple)?.render();
            let style = if action.nop { ", style=dashed" } else { "" };
            let _ = writeln!(
                out,
                "    n{} [label=\"{}. {}\\n{}\", color={}{}];",
                vertex.index(),
                position + 1,
                escape(&text),
                action,
                color(action.kind),
                style
            );
        }

        for edge in self.graph.edge_references() {
            let _ = writeln!(
                out,
                "    n{} -> n{};",
                edge.source().index(),
                edge.target().index()
            );
        }

        out.push_str("}\n");
        Ok(out)
    }

    pub fn write_graphviz(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        let dot = self.to_graphviz()?;
        files::write_atomic(path, dot.as_bytes()).structured(CommitError::WriteGraphviz {
            path: path.display().to_string(),
        })
    }
}
