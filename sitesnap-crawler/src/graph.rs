use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

/// Serialized form of a [`LinkGraph`], as written to `graph.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Page-to-page link graph of one crawl job.
///
/// Backed by ordered sets so serialization is sorted without an extra pass.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    nodes: BTreeSet<String>,
    edges: BTreeSet<(String, String)>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, url: &str) {
        if !self.nodes.contains(url) {
            self.nodes.insert(url.to_string());
        }
    }

    /// Record `source -> target`; both ends become nodes.
    pub fn add_edge(&mut self, source: &str, target: &str) {
        self.add_node(source);
        self.add_node(target);
        self.edges.insert((source.to_string(), target.to_string()));
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, url: &str) -> bool {
        self.nodes.contains(url)
    }

    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .contains(&(source.to_string(), target.to_string()))
    }

    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self
                .nodes
                .iter()
                .map(|id| GraphNode { id: id.clone() })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|(source, target)| GraphEdge {
                    source: source.clone(),
                    target: target.clone(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_document())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_imply_nodes() {
        let mut graph = LinkGraph::new();
        graph.add_edge("https://e.com/b", "https://e.com/a");
        graph.add_edge("https://e.com/b", "https://e.com/a");
        graph.add_node("https://e.com/c");

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node_count(), 3);
        assert!(graph.contains_node("https://e.com/a"));
        assert!(graph.contains_edge("https://e.com/b", "https://e.com/a"));
    }

    #[test]
    fn test_document_is_sorted() {
        let mut graph = LinkGraph::new();
        graph.add_edge("https://e.com/z", "https://e.com/a");
        graph.add_edge("https://e.com/m", "https://e.com/z");
        graph.add_edge("https://e.com/m", "https://e.com/b");

        let doc = graph.to_document();
        let ids: Vec<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "https://e.com/a",
                "https://e.com/b",
                "https://e.com/m",
                "https://e.com/z"
            ]
        );

        let edges: Vec<(&str, &str)> = doc
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(
            edges,
            vec![
                ("https://e.com/m", "https://e.com/b"),
                ("https://e.com/m", "https://e.com/z"),
                ("https://e.com/z", "https://e.com/a"),
            ]
        );
    }

    #[test]
    fn test_json_shape() {
        let mut graph = LinkGraph::new();
        graph.add_edge("https://e.com/", "https://e.com/x");

        let value: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
        assert_eq!(value["nodes"][0]["id"], "https://e.com/");
        assert_eq!(value["edges"][0]["source"], "https://e.com/");
        assert_eq!(value["edges"][0]["target"], "https://e.com/x");
    }
}
