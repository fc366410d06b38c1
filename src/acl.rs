//! Packet-header predicates used by filter lines.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::ip_space::IpSpace;

/// Inclusive integer range over a header field.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubRange {
    pub start: u32,
    pub end: u32,
}

impl SubRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn single(value: u32) -> Self {
        Self::new(value, value)
    }

    pub fn contains(&self, value: u32) -> bool {
        self.start <= value && value <= self.end
    }
}

impl Display for SubRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TcpFlag {
    Ack,
    Cwr,
    Ece,
    Fin,
    Psh,
    Rst,
    Syn,
    Urg,
}

impl TcpFlag {
    pub const ALL: [TcpFlag; 8] = [
        TcpFlag::Ack,
        TcpFlag::Cwr,
        TcpFlag::Ece,
        TcpFlag::Fin,
        TcpFlag::Psh,
        TcpFlag::Rst,
        TcpFlag::Syn,
        TcpFlag::Urg,
    ];
}

/// Required values for a subset of TCP flags; unlisted flags are free.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TcpFlagsMatch {
    pub flags: Vec<(TcpFlag, bool)>,
}

/// A conjunction of per-field packet constraints.
///
/// Empty lists and `None` leave a field unconstrained. A non-empty list is
/// the disjunction of its elements. `negate` complements the whole match.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HeaderSpace {
    pub dst_ips: Option<IpSpace>,
    pub not_dst_ips: Option<IpSpace>,
    pub src_ips: Option<IpSpace>,
    pub not_src_ips: Option<IpSpace>,
    pub ip_protocols: BTreeSet<u8>,
    pub not_ip_protocols: BTreeSet<u8>,
    pub dst_ports: Vec<SubRange>,
    pub not_dst_ports: Vec<SubRange>,
    pub src_ports: Vec<SubRange>,
    pub not_src_ports: Vec<SubRange>,
    pub icmp_types: Vec<SubRange>,
    pub icmp_codes: Vec<SubRange>,
    /// Any one of these flag matches is enough.
    pub tcp_flags: Vec<TcpFlagsMatch>,
    pub negate: bool,
}

/// A boolean predicate over a packet header.
///
/// Equality is structural only. Two unequal expressions may well denote
/// the same set of packets.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AclLineMatchExpr {
    True,
    False,
    And(Vec<AclLineMatchExpr>),
    Or(Vec<AclLineMatchExpr>),
    Not(Box<AclLineMatchExpr>),
    MatchHeaderSpace(Box<HeaderSpace>),
    /// Packets entering through one of the named interfaces.
    MatchSrcInterface(BTreeSet<String>),
    /// Packets originated by the device itself.
    OriginatingFromDevice,
}

impl AclLineMatchExpr {
    pub fn header_space(header_space: HeaderSpace) -> Self {
        AclLineMatchExpr::MatchHeaderSpace(Box::new(header_space))
    }

    pub fn match_dst(space: impl Into<IpSpace>) -> Self {
        Self::header_space(HeaderSpace {
            dst_ips: Some(space.into()),
            ..HeaderSpace::default()
        })
    }

    pub fn match_src(space: impl Into<IpSpace>) -> Self {
        Self::header_space(HeaderSpace {
            src_ips: Some(space.into()),
            ..HeaderSpace::default()
        })
    }

    pub fn match_dst_port(range: SubRange) -> Self {
        Self::header_space(HeaderSpace {
            dst_ports: vec![range],
            ..HeaderSpace::default()
        })
    }

    pub fn match_ip_protocol(protocol: u8) -> Self {
        Self::header_space(HeaderSpace {
            ip_protocols: BTreeSet::from([protocol]),
            ..HeaderSpace::default()
        })
    }

    /// Conjunction, flattening nested `And`s and dropping `True`s.
    pub fn and(exprs: impl IntoIterator<Item = AclLineMatchExpr>) -> Self {
        let mut conjuncts = Vec::new();
        for expr in exprs {
            match expr {
                AclLineMatchExpr::True => {}
                AclLineMatchExpr::False => return AclLineMatchExpr::False,
                AclLineMatchExpr::And(inner) => conjuncts.extend(inner),
                other => conjuncts.push(other),
            }
        }
        match conjuncts.len() {
            0 => AclLineMatchExpr::True,
            1 => conjuncts.pop().unwrap_or(AclLineMatchExpr::True),
            _ => AclLineMatchExpr::And(conjuncts),
        }
    }

    /// Disjunction, flattening nested `Or`s and dropping `False`s.
    pub fn or(exprs: impl IntoIterator<Item = AclLineMatchExpr>) -> Self {
        let mut disjuncts = Vec::new();
        for expr in exprs {
            match expr {
                AclLineMatchExpr::False => {}
                AclLineMatchExpr::True => return AclLineMatchExpr::True,
                AclLineMatchExpr::Or(inner) => disjuncts.extend(inner),
                other => disjuncts.push(other),
            }
        }
        match disjuncts.len() {
            0 => AclLineMatchExpr::False,
            1 => disjuncts.pop().unwrap_or(AclLineMatchExpr::False),
            _ => AclLineMatchExpr::Or(disjuncts),
        }
    }

    /// Negation, folding constants and double negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: AclLineMatchExpr) -> Self {
        match expr {
            AclLineMatchExpr::True => AclLineMatchExpr::False,
            AclLineMatchExpr::False => AclLineMatchExpr::True,
            AclLineMatchExpr::Not(inner) => *inner,
            other => AclLineMatchExpr::Not(Box::new(other)),
        }
    }

    /// Pushes a top-level negation one level inward (De Morgan).
    ///
    /// Expressions that are not a `Not`, and negations of leaves, are
    /// returned unchanged.
    pub fn negate_inward(self) -> Self {
        let AclLineMatchExpr::Not(inner) = self else {
            return self;
        };
        match *inner {
            AclLineMatchExpr::True => AclLineMatchExpr::False,
            AclLineMatchExpr::False => AclLineMatchExpr::True,
            AclLineMatchExpr::Not(e) => *e,
            AclLineMatchExpr::And(conjuncts) => {
                AclLineMatchExpr::or(conjuncts.into_iter().map(AclLineMatchExpr::not))
            }
            AclLineMatchExpr::Or(disjuncts) => {
                AclLineMatchExpr::and(disjuncts.into_iter().map(AclLineMatchExpr::not))
            }
            leaf => AclLineMatchExpr::Not(Box::new(leaf)),
        }
    }

    /// Name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            AclLineMatchExpr::True => "True",
            AclLineMatchExpr::False => "False",
            AclLineMatchExpr::And(_) => "And",
            AclLineMatchExpr::Or(_) => "Or",
            AclLineMatchExpr::Not(_) => "Not",
            AclLineMatchExpr::MatchHeaderSpace(_) => "MatchHeaderSpace",
            AclLineMatchExpr::MatchSrcInterface(_) => "MatchSrcInterface",
            AclLineMatchExpr::OriginatingFromDevice => "OriginatingFromDevice",
        }
    }
}

fn join_exprs(f: &mut Formatter<'_>, op: &str, exprs: &[AclLineMatchExpr]) -> std::fmt::Result {
    write!(f, "(")?;
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", e)?;
    }
    write!(f, ")")
}

impl Display for AclLineMatchExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AclLineMatchExpr::True => write!(f, "true"),
            AclLineMatchExpr::False => write!(f, "false"),
            AclLineMatchExpr::And(exprs) => join_exprs(f, "&", exprs),
            AclLineMatchExpr::Or(exprs) => join_exprs(f, "|", exprs),
            AclLineMatchExpr::Not(e) => write!(f, "!{}", e),
            AclLineMatchExpr::MatchHeaderSpace(hs) => {
                let mut parts = Vec::new();
                if let Some(s) = &hs.dst_ips {
                    parts.push(format!("dst={}", s));
                }
                if let Some(s) = &hs.src_ips {
                    parts.push(format!("src={}", s));
                }
                if !hs.ip_protocols.is_empty() {
                    parts.push(format!("proto={:?}", hs.ip_protocols));
                }
                if !hs.dst_ports.is_empty() {
                    let ports: Vec<_> = hs.dst_ports.iter().map(|r| r.to_string()).collect();
                    parts.push(format!("dport={}", ports.join(",")));
                }
                if parts.is_empty() {
                    parts.push("...".to_string());
                }
                write!(
                    f,
                    "{}hs[{}]",
                    if hs.negate { "!" } else { "" },
                    parts.join(" ")
                )
            }
            AclLineMatchExpr::MatchSrcInterface(names) => {
                write!(f, "srcIface{:?}", names)
            }
            AclLineMatchExpr::OriginatingFromDevice => write!(f, "fromDevice"),
        }
    }
}
