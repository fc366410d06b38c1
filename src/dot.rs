//! TraceDag to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **Inner nodes** are labeled with the hop's device name
//! - **Leaf nodes** additionally show the disposition, and are filled with
//!   a color telling successful and failed traces apart
//! - **Roots** get an incoming edge from an invisible source point at the
//!   top (source rank)
//! - Nodes that install a firewall session are drawn with a double border
//!
//! # Examples
//!
//! ```
//! use netbdd::trace::{FlowDisposition, Hop};
//! use netbdd::trace_dag::{Node, TraceDag};
//!
//! let leaf = Node::leaf(Hop::new("b", vec![]), None, FlowDisposition::Denied, None).unwrap();
//! let root = Node::inner(Hop::new("a", vec![]), None, vec![1]).unwrap();
//! let dag = TraceDag::new(vec![root, leaf], vec![0]).unwrap();
//!
//! let dot = dag.to_dot().unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::Write as _;

use crate::trace::Step;
use crate::trace_dag::TraceDag;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for inner nodes (default: "box")
    pub node_shape: &'static str,
    /// Shape for leaf nodes (default: "octagon")
    pub leaf_shape: &'static str,
    /// Fill color of leaves with a successful disposition (default: "palegreen")
    pub successful_color: &'static str,
    /// Fill color of the other leaves (default: "lightpink")
    pub failed_color: &'static str,
    /// Whether to list each hop's steps under the device name (default: false)
    pub show_steps: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "box",
            leaf_shape: "octagon",
            successful_color: "palegreen",
            failed_color: "lightpink",
            show_steps: false,
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn step_label(step: &Step) -> String {
    match step {
        Step::EnterInterface(iface) => format!("enter {}", iface),
        Step::Originated => "originated".to_string(),
        Step::Filter { name, action } => format!("filter {} {:?}", name, action),
        Step::Routing { next_hop: Some(ip) } => format!("route via {}", ip),
        Step::Routing { next_hop: None } => "route".to_string(),
        Step::ExitInterface(iface) => format!("exit {}", iface),
        Step::Delivered => "delivered".to_string(),
    }
}

impl TraceDag {
    /// Converts the DAG to DOT (Graphviz) format.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    /// Converts the DAG to DOT format with custom configuration.
    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "node [shape={}];", config.node_shape)?;

        for (id, node) in self.nodes().iter().enumerate() {
            let mut label = escape(&node.hop().node);
            if config.show_steps {
                for step in &node.hop().steps {
                    label.push_str("\\n");
                    label.push_str(&escape(&step_label(step)));
                }
            }
            let peripheries = if node.firewall_session_info().is_some() { 2 } else { 1 };
            match node.disposition() {
                Some(disposition) => {
                    let color = if disposition.is_successful() {
                        config.successful_color
                    } else {
                        config.failed_color
                    };
                    writeln!(
                        dot,
                        "{} [shape={}, style=filled, fillcolor={}, peripheries={}, label=\"{}\\n{}\"];",
                        id, config.leaf_shape, color, peripheries, label, disposition
                    )?;
                }
                None => {
                    writeln!(dot, "{} [peripheries={}, label=\"{}\"];", id, peripheries, label)?;
                }
            }
        }

        for (id, node) in self.nodes().iter().enumerate() {
            for &successor in node.successors() {
                writeln!(dot, "{} -> {};", id, successor)?;
            }
        }

        writeln!(dot, "{{ rank=source")?;
        for i in 0..self.roots().len() {
            writeln!(dot, "r{} [shape=point, style=invis];", i)?;
        }
        writeln!(dot, "}}")?;
        for (i, root) in self.roots().iter().enumerate() {
            writeln!(dot, "r{} -> {};", i, root)?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip_space::LineAction;
    use crate::trace::{FlowDisposition, Hop};
    use crate::trace_dag::Node;

    fn dag() -> TraceDag {
        let steps = vec![
            Step::EnterInterface("eth0".to_string()),
            Step::Filter {
                name: "acl \"in\"".to_string(),
                action: LineAction::Permit,
            },
        ];
        let nodes = vec![
            Node::inner(Hop::new("a", steps), None, vec![1, 2]).unwrap(),
            Node::leaf(Hop::new("b", vec![]), None, FlowDisposition::NoRoute, None).unwrap(),
            Node::leaf(Hop::new("c", vec![]), None, FlowDisposition::Denied, None).unwrap(),
        ];
        TraceDag::new(nodes, vec![0]).unwrap()
    }

    #[test]
    fn test_to_dot_basic() {
        let dot = dag().to_dot().unwrap();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("0 -> 1;"));
        assert!(dot.contains("0 -> 2;"));
        assert!(dot.contains("r0 -> 0;"));
        assert!(dot.contains("NO_ROUTE"));
    }

    #[test]
    fn test_to_dot_with_steps() {
        let config = DotConfig {
            show_steps: true,
            ..DotConfig::default()
        };
        let dot = dag().to_dot_with_config(&config).unwrap();
        assert!(dot.contains("enter eth0"));
        assert!(dot.contains("filter acl \\\"in\\\" Permit"));
    }
}
