use crate::config::{ConvertConfig, ResolvedColumns};
use crate::error::{ConvertError, Result};
use csv::StringRecord;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Graph};
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const COEF_DECIMALS: usize = 4;
const P_VALUE_DECIMALS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub count: usize,
}

/// A number that is written to the output exactly as stored.
#[derive(Debug, Clone)]
pub struct NumericToken(Box<RawValue>);

impl NumericToken {
    /// Keeps `text` as written, provided it is a finite JSON number.
    pub fn verbatim(text: &str) -> Option<Self> {
        let text = text.trim();
        text.parse::<f64>().ok().filter(|v| v.is_finite())?;
        RawValue::from_string(text.to_string()).ok().map(NumericToken)
    }

    /// Parses `text` and rewrites it with a fixed number of decimals.
    pub fn fixed(text: &str, decimals: usize) -> Option<Self> {
        let value = text.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
        RawValue::from_string(format!("{:.*}", decimals, value))
            .ok()
            .map(NumericToken)
    }

    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for NumericToken {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for NumericToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Model statistics taken from the first row of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStats {
    pub coef: String,
    pub exp_coef: NumericToken,
    pub se_coef: String,
    pub z: String,
    pub pr: NumericToken,
    pub n: NumericToken,
    pub pr_adjusted: NumericToken,
    pub hrtest_p: Option<NumericToken>,
}

impl EdgeStats {
    fn from_record(
        record: &StringRecord,
        cols: &ResolvedColumns,
        reformat: bool,
        line: u64,
    ) -> Result<Self> {
        let number = |field: &'static str, idx: usize, decimals: Option<usize>| {
            let raw = &record[idx];
            let token = match decimals {
                Some(decimals) if reformat => NumericToken::fixed(raw, decimals),
                _ => NumericToken::verbatim(raw),
            };
            token.ok_or_else(|| ConvertError::InvalidNumber {
                line,
                field,
                value: raw.to_string(),
            })
        };

        Ok(EdgeStats {
            coef: record[cols.coef].to_string(),
            exp_coef: number("exp_coef", cols.exp_coef, Some(COEF_DECIMALS))?,
            se_coef: record[cols.se_coef].to_string(),
            z: record[cols.z].to_string(),
            pr: number("Pr", cols.pr, Some(COEF_DECIMALS))?,
            n: number("N", cols.n, None)?,
            pr_adjusted: number("Pr_adjusted", cols.pr_adjusted, Some(P_VALUE_DECIMALS))?,
            hrtest_p: cols
                .hrtest_p
                .map(|idx| number("HRtest_p", idx, Some(P_VALUE_DECIMALS)))
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub stats: EdgeStats,
}

/// An edge together with the ids of its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub edge: &'a Edge,
}

/// Deduplicated nodes and edges, in the order they were first seen.
#[derive(Debug, Default)]
pub struct StatGraph {
    graph: Graph<Node, Edge, Directed>,
    nodes: HashMap<String, NodeIndex>,
    edges: HashMap<String, EdgeIndex>,
}

impl StatGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[cfg(test)]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(|&idx| &self.graph[idx])
    }

    #[cfg(test)]
    pub fn edge(&self, id: &str) -> Option<EdgeView<'_>> {
        let idx = *self.edges.get(id)?;
        let (source, target) = self.graph.edge_endpoints(idx)?;
        Some(EdgeView {
            source: &self.graph[source].id,
            target: &self.graph[target].id,
            edge: &self.graph[idx],
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeView<'_>> + '_ {
        self.graph.edge_references().map(move |e| EdgeView {
            source: &self.graph[e.source()].id,
            target: &self.graph[e.target()].id,
            edge: e.weight(),
        })
    }

    /// Bumps the count of `id`, creating the node with `desc` as its name on first sight.
    fn touch_node(&mut self, id: &str, desc: &str) -> NodeIndex {
        let graph = &mut self.graph;
        let idx = *self.nodes.entry(id.to_string()).or_insert_with(|| {
            graph.add_node(Node {
                id: id.to_string(),
                name: desc.replace('\'', ""),
                count: 0,
            })
        });
        self.graph[idx].count += 1;
        idx
    }

    fn add_row(
        &mut self,
        record: &StringRecord,
        cols: &ResolvedColumns,
        reformat: bool,
        line: u64,
    ) -> Result<()> {
        let expected = cols.min_width();
        if record.len() < expected {
            return Err(ConvertError::ShortRow {
                line,
                expected,
                found: record.len(),
            });
        }

        // an unbalanced quote swallows the following lines into one field
        if record.iter().any(|f| f.contains(['\n', '\r'])) {
            return Err(ConvertError::UnterminatedQuote { line });
        }

        let source = &record[cols.source];
        let target = &record[cols.target];
        debug!(line, source, target, "row");

        let src = self.touch_node(source, &record[cols.source_desc]);
        let dst = self.touch_node(target, &record[cols.target_desc]);

        let edge_id = format!("{}_{}", source, target);
        if !self.edges.contains_key(&edge_id) {
            let stats = EdgeStats::from_record(record, cols, reformat, line)?;
            debug!(
                edge = %edge_id,
                coef = %stats.coef,
                se_coef = %stats.se_coef,
                z = %stats.z,
                "new edge"
            );
            let idx = self.graph.add_edge(
                src,
                dst,
                Edge {
                    id: edge_id.clone(),
                    stats,
                },
            );
            self.edges.insert(edge_id, idx);
        }

        Ok(())
    }
}

pub fn read_edges<P: AsRef<Path>>(path: P, config: &ConvertConfig) -> Result<StatGraph> {
    let file = File::open(path)?;
    read_edges_from(file, config)
}

/// Aggregates an edge table. The first line is a header; the run stops at
/// the first row that is too short, spans several lines through an
/// unbalanced quote, or carries a non-numeric statistic.
pub fn read_edges_from<R: Read>(reader: R, config: &ConvertConfig) -> Result<StatGraph> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        info!("edge table is empty");
        return Ok(StatGraph::default());
    }
    let cols = config.columns.resolve(&headers)?;

    let mut graph = StatGraph::default();
    let mut rows = 0usize;

    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |pos| pos.line());
        graph.add_row(&record, &cols, config.reformat, line)?;
        rows += 1;
    }

    info!(
        rows,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "aggregated edge table"
    );

    Ok(graph)
}
