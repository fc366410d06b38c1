//! Compilation of IP spaces and match expressions into BDDs.
//!
//! The compilers memoize per instance. Since the input trees are immutable
//! and the named-space map is fixed for the lifetime of a compiler, a cached
//! result never goes stale.

use std::cell::RefCell;
use std::collections::HashMap;

use log::debug;

use crate::acl::{AclLineMatchExpr, HeaderSpace, TcpFlagsMatch};
use crate::bdd::Bdd;
use crate::error::ToBddError;
use crate::ip::IpWildcard;
use crate::ip_space::{IpSpace, LineAction, NamedIpSpaces};
use crate::packet::{BddInteger, BddPacket};
use crate::reference::Ref;

/// Compiles [`IpSpace`] trees over one address field of a packet.
pub struct IpSpaceToBdd<'a> {
    bdd: &'a Bdd,
    field: &'a BddInteger,
    named: &'a NamedIpSpaces,
    cache: RefCell<HashMap<IpSpace, Ref>>,
}

impl<'a> IpSpaceToBdd<'a> {
    pub fn new(bdd: &'a Bdd, field: &'a BddInteger, named: &'a NamedIpSpaces) -> Self {
        assert_eq!(field.width(), 32, "IP spaces need a 32-bit field");
        Self {
            bdd,
            field,
            named,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn bdd(&self) -> &'a Bdd {
        self.bdd
    }

    pub fn named(&self) -> &'a NamedIpSpaces {
        self.named
    }

    pub fn to_bdd(&self, space: &IpSpace) -> Result<Ref, ToBddError> {
        let mut visiting = Vec::new();
        self.visit(space, &mut visiting)
    }

    /// The must-match bits of `wildcard`; don't-care bits are left free.
    pub fn wildcard_to_bdd(&self, wildcard: &IpWildcard) -> Ref {
        self.field
            .wildcard(self.bdd, wildcard.ip().bits(), wildcard.mask())
    }

    fn visit<'s>(&self, space: &'s IpSpace, visiting: &mut Vec<&'s str>) -> Result<Ref, ToBddError>
    where
        'a: 's,
    {
        if let Some(&res) = self.cache.borrow().get(space) {
            return Ok(res);
        }

        let bdd = self.bdd;
        let res = match space {
            IpSpace::Empty => bdd.zero(),
            IpSpace::Universe => bdd.one(),
            IpSpace::Ip(ip) => self.field.value(bdd, ip.bits()),
            IpSpace::Prefix(prefix) => {
                self.field
                    .prefix(bdd, prefix.start().bits(), prefix.length() as u32)
            }
            IpSpace::Wildcard(wildcard) => self.wildcard_to_bdd(wildcard),
            IpSpace::Acl(lines) => {
                // First match wins: fold from the last line, so that each
                // line only sees what no earlier line matched.
                let mut acc = bdd.zero();
                for line in lines.iter().rev() {
                    let matched = self.visit(&line.space, visiting)?;
                    let action = match line.action {
                        LineAction::Permit => bdd.one(),
                        LineAction::Reject => bdd.zero(),
                    };
                    acc = bdd.apply_ite(matched, action, acc);
                }
                acc
            }
            IpSpace::WildcardSet { include, exclude } => {
                let included = bdd.apply_or_many(include.iter().map(|w| self.wildcard_to_bdd(w)));
                let excluded = bdd.apply_or_many(exclude.iter().map(|w| self.wildcard_to_bdd(w)));
                bdd.apply_and(included, -excluded)
            }
            IpSpace::Reference(name) => {
                let target = self
                    .named
                    .get(name)
                    .ok_or_else(|| ToBddError::UndefinedReference(name.clone()))?;
                if visiting.contains(&name.as_str()) {
                    return Err(ToBddError::CyclicReference(name.clone()));
                }
                visiting.push(name.as_str());
                let res = self.visit(target, visiting)?;
                visiting.pop();
                res
            }
        };

        self.cache.borrow_mut().insert(space.clone(), res);
        Ok(res)
    }
}

/// Compiles [`AclLineMatchExpr`] trees over all header fields of a packet.
pub struct AclLineMatchExprToBdd<'a> {
    packet: &'a BddPacket,
    dst_ips: IpSpaceToBdd<'a>,
    src_ips: IpSpaceToBdd<'a>,
    cache: RefCell<HashMap<AclLineMatchExpr, Ref>>,
}

impl<'a> AclLineMatchExprToBdd<'a> {
    pub fn new(packet: &'a BddPacket, named: &'a NamedIpSpaces) -> Self {
        Self {
            packet,
            dst_ips: IpSpaceToBdd::new(packet.bdd(), packet.dst_ip(), named),
            src_ips: IpSpaceToBdd::new(packet.bdd(), packet.src_ip(), named),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn bdd(&self) -> &'a Bdd {
        self.packet.bdd()
    }

    pub fn to_bdd(&self, expr: &AclLineMatchExpr) -> Result<Ref, ToBddError> {
        if let Some(&res) = self.cache.borrow().get(expr) {
            return Ok(res);
        }

        let bdd = self.bdd();
        let res = match expr {
            AclLineMatchExpr::True => bdd.one(),
            AclLineMatchExpr::False => bdd.zero(),
            AclLineMatchExpr::And(conjuncts) => {
                let mut acc = bdd.one();
                for e in conjuncts {
                    acc = bdd.apply_and(acc, self.to_bdd(e)?);
                }
                acc
            }
            AclLineMatchExpr::Or(disjuncts) => {
                let mut acc = bdd.zero();
                for e in disjuncts {
                    acc = bdd.apply_or(acc, self.to_bdd(e)?);
                }
                acc
            }
            AclLineMatchExpr::Not(e) => -self.to_bdd(e)?,
            AclLineMatchExpr::MatchHeaderSpace(hs) => self.header_space_to_bdd(hs)?,
            AclLineMatchExpr::MatchSrcInterface(_) | AclLineMatchExpr::OriginatingFromDevice => {
                debug!("No compilation rule for {}", expr.kind());
                return Err(ToBddError::UnsupportedExpression(expr.kind()));
            }
        };

        self.cache.borrow_mut().insert(expr.clone(), res);
        Ok(res)
    }

    pub fn header_space_to_bdd(&self, hs: &HeaderSpace) -> Result<Ref, ToBddError> {
        let packet = self.packet;
        let bdd = self.bdd();
        let mut constraints = Vec::new();

        if let Some(space) = &hs.dst_ips {
            constraints.push(self.dst_ips.to_bdd(space)?);
        }
        if let Some(space) = &hs.not_dst_ips {
            constraints.push(-self.dst_ips.to_bdd(space)?);
        }
        if let Some(space) = &hs.src_ips {
            constraints.push(self.src_ips.to_bdd(space)?);
        }
        if let Some(space) = &hs.not_src_ips {
            constraints.push(-self.src_ips.to_bdd(space)?);
        }

        let protocol = packet.ip_protocol();
        if !hs.ip_protocols.is_empty() {
            constraints.push(
                bdd.apply_or_many(hs.ip_protocols.iter().map(|&p| protocol.value(bdd, p as u32))),
            );
        }
        if !hs.not_ip_protocols.is_empty() {
            constraints.push(
                -bdd.apply_or_many(
                    hs.not_ip_protocols
                        .iter()
                        .map(|&p| protocol.value(bdd, p as u32)),
                ),
            );
        }

        let ranged = [
            (packet.dst_port(), &hs.dst_ports, false),
            (packet.dst_port(), &hs.not_dst_ports, true),
            (packet.src_port(), &hs.src_ports, false),
            (packet.src_port(), &hs.not_src_ports, true),
            (packet.icmp_type(), &hs.icmp_types, false),
            (packet.icmp_code(), &hs.icmp_codes, false),
        ];
        for (field, ranges, negated) in ranged {
            if ranges.is_empty() {
                continue;
            }
            let f = packet.ranges(field, ranges);
            constraints.push(if negated { -f } else { f });
        }

        if !hs.tcp_flags.is_empty() {
            constraints.push(
                bdd.apply_or_many(hs.tcp_flags.iter().map(|m| self.tcp_flags_to_bdd(m))),
            );
        }

        let res = bdd.apply_and_many(constraints);
        Ok(if hs.negate { -res } else { res })
    }

    fn tcp_flags_to_bdd(&self, m: &TcpFlagsMatch) -> Ref {
        let bdd = self.bdd();
        bdd.apply_and_many(m.flags.iter().map(|&(flag, value)| {
            let var = self.packet.tcp_flag(flag);
            if value {
                var
            } else {
                -var
            }
        }))
    }
}
