//! Graphviz export of the dependency graph

use super::graph::{DepNode, DependencyGraph};
use crate::features::memory_ssa::MemorySsa;
use crate::features::taint::TaintAnalysis;
use crate::ir::Module;
use std::fmt::Write;

impl DependencyGraph {
    /// Render the graph in DOT format
    ///
    /// Sources are filled red, reset nodes blue and other tainted nodes
    /// orange when a taint result is given. Memory SSA variables are drawn
    /// as ellipses, IR values as boxes.
    #[must_use]
    pub fn to_dot(&self, module: &Module, mssa: &MemorySsa, taint: Option<&TaintAnalysis>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph DependencyGraph {\n");
        let _ = writeln!(dot, "    label=\"{}\";", escape_dot(&module.name));
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    rankdir=TB;\n\n");

        for ix in self.node_indices() {
            let node = self.node(ix);
            let (shape, label) = match node {
                DepNode::Value(v) => {
                    let text = match module.opcode(v) {
                        Some(op) => format!("{} = {}", module.display_name(v), op.as_str()),
                        None => module.display_name(v),
                    };
                    ("box", text)
                }
                DepNode::Var(f, v) => {
                    let var = mssa
                        .function(f)
                        .map_or_else(|| v.to_string(), |ssa| ssa.var_label(v));
                    ("ellipse", format!("{}: {}", module.function(f).name, var))
                }
            };

            let tainted = taint.map_or(false, |t| t.is_tainted(self, node));
            let style = if self.sources.contains(&node) {
                ", style=filled, fillcolor=lightcoral"
            } else if self.resets.contains(&node) {
                ", style=filled, fillcolor=lightblue"
            } else if tainted {
                ", style=filled, fillcolor=orange"
            } else {
                ""
            };

            let _ = writeln!(
                dot,
                "    \"{}\" [shape={shape}, label=\"{}\"{style}];",
                node,
                escape_dot(&label)
            );
        }

        dot.push('\n');

        for ix in self.node_indices() {
            for succ in self.successors(ix) {
                let _ = writeln!(dot, "    \"{}\" -> \"{}\";", self.node(ix), self.node(succ));
            }
        }

        if !self.call_conditions.is_empty() {
            dot.push('\n');
            for (call, conds) in &self.call_conditions {
                for cond in conds {
                    let _ = writeln!(
                        dot,
                        "    \"{}\" -> \"{}\" [style=dashed];",
                        DepNode::Value(*cond),
                        DepNode::Value(*call)
                    );
                }
            }
        }

        dot.push_str("}\n");
        dot
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot() {
        assert_eq!(escape_dot("a\"b"), "a\\\"b");
        assert_eq!(escape_dot("x<y>"), "x\\<y\\>");
        assert_eq!(escape_dot("l1\r\nl2"), "l1\\nl2");
    }
}
