//! Serialization of a [`StatGraph`] into the `var jsonobj = [...]` script
//! loaded by the visualization page.

use crate::aggregation::{EdgeView, NumericToken, StatGraph};
use crate::error::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const VARIABLE_PREFIX: &str = "var jsonobj = ";

#[derive(Serialize)]
struct Element<'a> {
    data: Data<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Data<'a> {
    Node(NodeData<'a>),
    Edge(EdgeData<'a>),
}

#[derive(Serialize)]
struct NodeData<'a> {
    id: &'a str,
    name: &'a str,
    count: usize,
}

#[derive(Serialize)]
struct EdgeData<'a> {
    id: &'a str,
    source: &'a str,
    target: &'a str,
    #[serde(rename = "valueN")]
    value_n: &'a NumericToken,
    #[serde(rename = "valuePrAdjusted")]
    value_pr_adjusted: &'a NumericToken,
    #[serde(rename = "valueexp_coef")]
    value_exp_coef: &'a NumericToken,
    #[serde(rename = "pHRtest", skip_serializing_if = "Option::is_none")]
    p_hrtest: Option<&'a NumericToken>,
    #[serde(rename = "rawPvalue", skip_serializing_if = "Option::is_none")]
    raw_pvalue: Option<&'a NumericToken>,
}

impl<'a> From<EdgeView<'a>> for EdgeData<'a> {
    fn from(view: EdgeView<'a>) -> Self {
        let stats = &view.edge.stats;
        let hrtest_p = stats.hrtest_p.as_ref();
        EdgeData {
            id: &view.edge.id,
            source: view.source,
            target: view.target,
            value_n: &stats.n,
            value_pr_adjusted: &stats.pr_adjusted,
            value_exp_coef: &stats.exp_coef,
            p_hrtest: hrtest_p,
            // the raw p-value travels with the hazard ratio test columns
            raw_pvalue: hrtest_p.map(|_| &stats.pr),
        }
    }
}

fn elements(graph: &StatGraph) -> Vec<Element<'_>> {
    let nodes = graph.nodes().map(|node| Element {
        data: Data::Node(NodeData {
            id: &node.id,
            name: &node.name,
            count: node.count,
        }),
    });
    let edges = graph.edges().map(|view| Element {
        data: Data::Edge(view.into()),
    });
    nodes.chain(edges).collect()
}

/// Writes every node, then every edge, in first-seen order.
pub fn export_to_jsonobj<W: Write>(graph: &StatGraph, mut writer: W) -> Result<()> {
    writer.write_all(VARIABLE_PREFIX.as_bytes())?;
    serde_json::to_writer(&mut writer, &elements(graph))?;
    writer.flush()?;
    Ok(())
}

pub fn write_jsonobj<P: AsRef<Path>>(graph: &StatGraph, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    export_to_jsonobj(graph, BufWriter::new(file))?;
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "wrote jsonobj"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{read_edges, read_edges_from};
    use crate::config::{ConvertConfig, Layout};

    fn render_jsonobj(graph: &StatGraph) -> Result<String> {
        let mut buf = Vec::new();
        export_to_jsonobj(graph, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn graph_from(text: &str, config: &ConvertConfig) -> StatGraph {
        read_edges_from(text.as_bytes(), config).unwrap()
    }

    #[test]
    fn test_hazard_example_output() {
        let graph = graph_from(
            "header\nA,B,1.2,3.3,0.1,2.0,0.01,150,0.00012,0.00034,'Gene A','Gene B'\n",
            &Layout::Hazard.config(),
        );

        assert_eq!(
            render_jsonobj(&graph).unwrap(),
            concat!(
                "var jsonobj = [",
                r#"{"data":{"id":"A","name":"Gene A","count":1}},"#,
                r#"{"data":{"id":"B","name":"Gene B","count":1}},"#,
                r#"{"data":{"id":"A_B","source":"A","target":"B","valueN":150,"#,
                r#""valuePrAdjusted":0.00034,"valueexp_coef":3.3000,"#,
                r#""pHRtest":0.00012,"rawPvalue":0.0100}}]"#,
            )
        );
    }

    #[test]
    fn test_basic_output_has_no_test_fields() {
        let graph = graph_from(
            "header\nA,B,1.2,3.3,0.1,2.0,0.01,150,0.00034,'Gene A','Gene B'\n",
            &Layout::Basic.config(),
        );

        assert_eq!(
            render_jsonobj(&graph).unwrap(),
            concat!(
                "var jsonobj = [",
                r#"{"data":{"id":"A","name":"Gene A","count":1}},"#,
                r#"{"data":{"id":"B","name":"Gene B","count":1}},"#,
                r#"{"data":{"id":"A_B","source":"A","target":"B","valueN":150,"#,
                r#""valuePrAdjusted":0.00034,"valueexp_coef":3.3}}]"#,
            )
        );
    }

    #[test]
    fn test_names_are_escaped() {
        let graph = graph_from(
            "header\nA,B,1,1,1,1,0.1,5,0.1,0.1,\"say \"\"hi\"\" </script>\",b\\c\n",
            &Layout::Hazard.config(),
        );

        let text = render_jsonobj(&graph).unwrap();
        let array: serde_json::Value =
            serde_json::from_str(text.strip_prefix(VARIABLE_PREFIX).unwrap()).unwrap();
        assert_eq!(array[0]["data"]["name"], "say \"hi\" </script>");
        assert_eq!(array[1]["data"]["name"], "b\\c");
    }

    #[test]
    fn test_crlf_input_output() {
        let graph = graph_from(
            "header\r\nA,B,1.2,3.3,0.1,2.0,0.01,150,0.00012,0.00034,'Gene A','Gene B'\r\n",
            &Layout::Hazard.config(),
        );

        let text = render_jsonobj(&graph).unwrap();
        assert!(!text.contains("\\r"));
        assert!(text.contains(r#"{"data":{"id":"B","name":"Gene B","count":1}}"#));
        assert!(text.ends_with(r#""pHRtest":0.00012,"rawPvalue":0.0100}}]"#));
    }

    #[test]
    fn test_empty_graph() {
        let graph = graph_from("header\n", &Layout::Hazard.config());
        assert_eq!(render_jsonobj(&graph).unwrap(), "var jsonobj = []");
    }

    #[test]
    fn test_output_parses_and_counts_match() {
        let graph = read_edges("data/all.edges.csv", &Layout::Hazard.config()).unwrap();
        let text = render_jsonobj(&graph).unwrap();
        let array: Vec<serde_json::Value> =
            serde_json::from_str(text.strip_prefix(VARIABLE_PREFIX).unwrap()).unwrap();

        assert_eq!(array.len(), 8);
        assert_eq!(array[0]["data"]["id"], "TP53");
        assert_eq!(array[0]["data"]["count"], 4);
        assert_eq!(array[4]["data"]["id"], "TP53_MDM2");
        assert_eq!(array[4]["data"]["valueN"], 312);
        assert!(array[4]["data"].get("name").is_none());
    }

    #[test]
    fn test_write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.js");
        let second = dir.path().join("second.js");

        let config = Layout::Hazard.config();
        write_jsonobj(&read_edges("data/all.edges.csv", &config).unwrap(), &first).unwrap();
        write_jsonobj(&read_edges("data/all.edges.csv", &config).unwrap(), &second).unwrap();

        let first = std::fs::read(first).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, std::fs::read(second).unwrap());
    }
}
