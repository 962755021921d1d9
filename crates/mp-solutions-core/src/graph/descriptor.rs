//! Reader for binary graph descriptors (`CalculatorGraphConfig` protobufs).
//!
//! Only the fields needed to check a session's contract are decoded: the
//! graph's declared streams and side packets and, per node, the calculator
//! name and its stream/side-packet wiring. Every other field is skipped.
use std::collections::BTreeSet;

use prost::Message;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DescriptorError {
    #[error(transparent)]
    Decode(#[from] prost::DecodeError),
    #[error("descriptor declares no nodes")]
    NoNodes,
}

type Result<T> = std::result::Result<T, DescriptorError>;

/// Wire layout of `CalculatorGraphConfig.Node`, restricted to wiring.
#[derive(Clone, PartialEq, Message)]
struct NodeMessage {
    #[prost(string, tag = "1")]
    name: String,
    #[prost(string, tag = "2")]
    calculator: String,
    #[prost(string, repeated, tag = "3")]
    input_stream: Vec<String>,
    #[prost(string, repeated, tag = "4")]
    output_stream: Vec<String>,
    #[prost(string, repeated, tag = "5")]
    input_side_packet: Vec<String>,
    #[prost(string, repeated, tag = "6")]
    output_side_packet: Vec<String>,
}

/// Wire layout of `CalculatorGraphConfig`, restricted to the graph contract.
#[derive(Clone, PartialEq, Message)]
struct GraphMessage {
    #[prost(message, repeated, tag = "1")]
    node: Vec<NodeMessage>,
    #[prost(string, repeated, tag = "10")]
    input_stream: Vec<String>,
    #[prost(string, repeated, tag = "15")]
    output_stream: Vec<String>,
    #[prost(string, repeated, tag = "16")]
    input_side_packet: Vec<String>,
    #[prost(string, repeated, tag = "17")]
    output_side_packet: Vec<String>,
    #[prost(string, tag = "20")]
    graph_type: String,
}

/// Strip the `TAG:index:` prefix from a stream or side-packet entry.
pub fn packet_name(entry: &str) -> &str {
    entry.rsplit_once(':').map_or(entry, |(_, name)| name)
}

fn packet_names(entries: Vec<String>) -> Vec<String> {
    entries
        .iter()
        .map(|entry| packet_name(entry).to_string())
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// One calculator node of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub name: Option<String>,
    pub calculator: String,
    pub input_streams: Vec<String>,
    pub output_streams: Vec<String>,
    pub input_side_packets: Vec<String>,
    pub output_side_packets: Vec<String>,
}

impl From<NodeMessage> for NodeDescriptor {
    fn from(node: NodeMessage) -> Self {
        Self {
            name: non_empty(node.name),
            calculator: node.calculator,
            input_streams: packet_names(node.input_stream),
            output_streams: packet_names(node.output_stream),
            input_side_packets: packet_names(node.input_side_packet),
            output_side_packets: packet_names(node.output_side_packet),
        }
    }
}

/// The declared contract of a processing graph.
///
/// Stream and side-packet names are stored without their `TAG:index:`
/// prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphDescriptor {
    pub graph_type: Option<String>,
    pub nodes: Vec<NodeDescriptor>,
    pub input_streams: Vec<String>,
    pub output_streams: Vec<String>,
    pub input_side_packets: Vec<String>,
    pub output_side_packets: Vec<String>,
}

impl GraphDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let graph = GraphMessage::decode(bytes)?;
        if graph.node.is_empty() {
            return Err(DescriptorError::NoNodes);
        }
        Ok(Self {
            graph_type: non_empty(graph.graph_type),
            nodes: graph.node.into_iter().map(NodeDescriptor::from).collect(),
            input_streams: packet_names(graph.input_stream),
            output_streams: packet_names(graph.output_stream),
            input_side_packets: packet_names(graph.input_side_packet),
            output_side_packets: packet_names(graph.output_side_packet),
        })
    }

    /// Side inputs the caller has to supply: those the graph declares plus
    /// any node side input no node produces.
    pub fn required_side_inputs(&self) -> Vec<&str> {
        let produced: BTreeSet<&str> = self
            .nodes
            .iter()
            .flat_map(|node| node.output_side_packets.iter().map(String::as_str))
            .collect();
        let consumed = self
            .nodes
            .iter()
            .flat_map(|node| node.input_side_packets.iter().map(String::as_str))
            .filter(|name| !produced.contains(name));
        self.input_side_packets
            .iter()
            .map(String::as_str)
            .chain(consumed)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether `name` is published as a side packet rather than a stream.
    pub fn produces_side_packet(&self, name: &str) -> bool {
        self.output_side_packets.iter().any(|out| out == name)
            || self
                .nodes
                .iter()
                .any(|node| node.output_side_packets.iter().any(|out| out == name))
    }

    /// Whether running the graph can yield a value named `name`.
    pub fn produces(&self, name: &str) -> bool {
        let stream = self.output_streams.iter().any(|out| out == name)
            || self
                .nodes
                .iter()
                .any(|node| node.output_streams.iter().any(|out| out == name));
        stream || self.produces_side_packet(name)
    }

    pub fn calculators(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.calculator.as_str())
    }
}
