//! Simulated packet traces.

use std::fmt::{Display, Formatter};

use crate::ip::Ip;
use crate::ip_space::LineAction;

/// Terminal classification of a simulated packet.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FlowDisposition {
    Accepted,
    DeliveredToSubnet,
    ExitsNetwork,
    InsufficientInfo,
    NeighborUnreachable,
    Denied,
    DeniedIn,
    DeniedOut,
    NoRoute,
    NullRouted,
    Loop,
}

impl FlowDisposition {
    /// Whether the packet reached a destination, which is when a return flow
    /// exists.
    pub fn is_successful(self) -> bool {
        matches!(
            self,
            FlowDisposition::Accepted | FlowDisposition::DeliveredToSubnet | FlowDisposition::ExitsNetwork
        )
    }
}

impl Display for FlowDisposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlowDisposition::Accepted => "ACCEPTED",
            FlowDisposition::DeliveredToSubnet => "DELIVERED_TO_SUBNET",
            FlowDisposition::ExitsNetwork => "EXITS_NETWORK",
            FlowDisposition::InsufficientInfo => "INSUFFICIENT_INFO",
            FlowDisposition::NeighborUnreachable => "NEIGHBOR_UNREACHABLE",
            FlowDisposition::Denied => "DENIED",
            FlowDisposition::DeniedIn => "DENIED_IN",
            FlowDisposition::DeniedOut => "DENIED_OUT",
            FlowDisposition::NoRoute => "NO_ROUTE",
            FlowDisposition::NullRouted => "NULL_ROUTED",
            FlowDisposition::Loop => "LOOP",
        };
        write!(f, "{}", s)
    }
}

/// A concrete packet entering the network at `ingress_node`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Flow {
    pub ingress_node: String,
    pub src_ip: Ip,
    pub dst_ip: Ip,
    pub ip_protocol: u8,
    pub src_port: u16,
    pub dst_port: u16,
}

impl Flow {
    /// The flow of a reply: endpoints swapped, entering at `ingress_node`.
    pub fn reverse(&self, ingress_node: impl Into<String>) -> Self {
        Self {
            ingress_node: ingress_node.into(),
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            ip_protocol: self.ip_protocol,
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }
}

impl Display for Flow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}:{} -> {}:{} proto {}",
            self.ingress_node, self.src_ip, self.src_port, self.dst_ip, self.dst_port, self.ip_protocol
        )
    }
}

/// One decision taken while a packet crosses a device.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Step {
    EnterInterface(String),
    Originated,
    Filter { name: String, action: LineAction },
    Routing { next_hop: Option<Ip> },
    ExitInterface(String),
    Delivered,
}

/// The steps taken on one device.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Hop {
    pub node: String,
    pub steps: Vec<Step>,
}

impl Hop {
    pub fn new(node: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            node: node.into(),
            steps,
        }
    }
}

/// A firewall session installed on a hop, matching the return traffic.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct FirewallSessionTraceInfo {
    pub hostname: String,
    pub incoming_interfaces: Vec<String>,
    pub session_flow: Flow,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Trace {
    pub disposition: FlowDisposition,
    pub hops: Vec<Hop>,
}

/// A complete trace with everything needed to simulate its reply.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TraceAndReverseFlow {
    pub trace: Trace,
    pub reverse_flow: Option<Flow>,
    /// Sessions installed along the trace, in path order.
    pub new_firewall_sessions: Vec<FirewallSessionTraceInfo>,
}
