//! Rewriting of [`IpSpace`] trees into smaller equivalent ones.
//!
//! Every rewrite preserves membership of each address, and simplifying an
//! already simplified space returns it unchanged. Where structure alone is
//! not enough to decide a rewrite, the compiled BDDs decide it.

use std::collections::BTreeSet;

use log::debug;

use crate::error::ToBddError;
use crate::ip::IpWildcard;
use crate::ip_space::{AclIpSpaceLine, IpSpace, LineAction};
use crate::reference::Ref;
use crate::to_bdd::IpSpaceToBdd;

/// Rewrites [`IpSpace`]s into smaller spaces admitting the same addresses.
pub struct IpSpaceSimplifier<'a> {
    to_bdd: IpSpaceToBdd<'a>,
}

impl<'a> IpSpaceSimplifier<'a> {
    /// Creates a simplifier resolving references through the compiler's
    /// named spaces.
    pub fn new(to_bdd: IpSpaceToBdd<'a>) -> Self {
        Self { to_bdd }
    }

    pub fn simplify(&self, space: &IpSpace) -> Result<IpSpace, ToBddError> {
        let res = match space {
            IpSpace::Empty | IpSpace::Universe | IpSpace::Ip(_) => space.clone(),
            IpSpace::Prefix(prefix) if prefix.length() == 0 => IpSpace::Universe,
            IpSpace::Prefix(_) => space.clone(),
            IpSpace::Wildcard(wildcard) if wildcard.is_any() => IpSpace::Universe,
            IpSpace::Wildcard(_) => space.clone(),
            IpSpace::Acl(lines) => self.simplify_acl(lines)?,
            IpSpace::WildcardSet { include, exclude } => self.simplify_wildcard_set(include, exclude),
            IpSpace::Reference(name) => self.simplify_reference(space, name)?,
        };
        if &res != space {
            debug!("Simplified {} to {}", space, res);
        }
        Ok(res)
    }

    fn simplify_acl(&self, lines: &[AclIpSpaceLine]) -> Result<IpSpace, ToBddError> {
        let mut kept = Vec::with_capacity(lines.len());
        for line in lines {
            let space = self.simplify(&line.space)?;
            if space == IpSpace::Empty {
                continue;
            }
            let absorbing = space == IpSpace::Universe;
            kept.push(AclIpSpaceLine {
                action: line.action,
                space,
            });
            if absorbing {
                break;
            }
        }

        // Nothing is permitted when no line permits.
        if kept.iter().all(|l| l.action == LineAction::Reject) {
            return Ok(IpSpace::Empty);
        }
        if kept.len() == 1 {
            if let Some(line) = kept.pop() {
                return Ok(line.space);
            }
        }
        let all_permit = kept.iter().all(|l| l.action == LineAction::Permit);
        let ends_universe = kept.last().is_some_and(|l| l.space == IpSpace::Universe);
        if all_permit && ends_universe {
            return Ok(IpSpace::Universe);
        }
        Ok(IpSpace::Acl(kept))
    }

    fn simplify_wildcard_set(
        &self,
        include: &BTreeSet<IpWildcard>,
        exclude: &BTreeSet<IpWildcard>,
    ) -> IpSpace {
        if include.is_empty() {
            return IpSpace::Empty;
        }
        let include_any = include.contains(&IpWildcard::ANY);
        if include_any && exclude.is_empty() {
            return IpSpace::Universe;
        }
        if include_any && exclude.contains(&IpWildcard::ANY) {
            return IpSpace::Empty;
        }

        let bdd = self.to_bdd.bdd();
        let excluded = self.union(exclude);
        let include: BTreeSet<IpWildcard> = include
            .iter()
            .copied()
            .filter(|w| !bdd.is_implies(self.to_bdd.wildcard_to_bdd(w), excluded))
            .collect();
        let included = self.union(&include);
        let exclude: BTreeSet<IpWildcard> = exclude
            .iter()
            .copied()
            .filter(|w| bdd.intersects(self.to_bdd.wildcard_to_bdd(w), included))
            .collect();

        match (include.len(), exclude.is_empty()) {
            (0, _) => IpSpace::Empty,
            (1, true) => match include.first() {
                Some(w) if w.is_any() => IpSpace::Universe,
                Some(&w) => IpSpace::from_wildcard(w),
                None => IpSpace::Empty,
            },
            _ => IpSpace::WildcardSet { include, exclude },
        }
    }

    fn simplify_reference(&self, space: &IpSpace, name: &str) -> Result<IpSpace, ToBddError> {
        // Compiling first surfaces undefined names and cycles before recursing.
        self.to_bdd.to_bdd(space)?;
        let target = self
            .to_bdd
            .named()
            .get(name)
            .ok_or_else(|| ToBddError::UndefinedReference(name.to_string()))?;
        Ok(match self.simplify(target)? {
            constant @ (IpSpace::Empty | IpSpace::Universe) => constant,
            _ => space.clone(),
        })
    }

    fn union(&self, wildcards: &BTreeSet<IpWildcard>) -> Ref {
        self.to_bdd
            .bdd()
            .apply_or_many(wildcards.iter().map(|w| self.to_bdd.wildcard_to_bdd(w)))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::ip::{Ip, Prefix};
    use crate::ip_space::NamedIpSpaces;
    use crate::packet::BddPacket;

    fn ip(s: &str) -> IpSpace {
        IpSpace::Ip(s.parse().unwrap())
    }

    fn wildcard(s: &str) -> IpWildcard {
        s.parse().unwrap()
    }

    fn acl(lines: impl IntoIterator<Item = AclIpSpaceLine>) -> IpSpace {
        IpSpace::Acl(lines.into_iter().collect())
    }

    fn check(packet: &BddPacket, named: &NamedIpSpaces, space: IpSpace, expected: IpSpace) {
        let simplifier = IpSpaceSimplifier::new(IpSpaceToBdd::new(packet.bdd(), packet.dst_ip(), named));
        let res = simplifier.simplify(&space).unwrap();
        assert_eq!(res, expected, "simplifying {}", space);
    }

    #[test]
    fn test_acl_drops_empty_lines_and_keeps_duplicates() {
        let packet = BddPacket::default();
        let named = NamedIpSpaces::new();
        check(
            &packet,
            &named,
            acl([
                AclIpSpaceLine::reject(IpSpace::Empty),
                AclIpSpaceLine::permit(ip("1.1.1.1")),
                AclIpSpaceLine::permit(ip("1.1.1.1")),
            ]),
            acl([
                AclIpSpaceLine::permit(ip("1.1.1.1")),
                AclIpSpaceLine::permit(ip("1.1.1.1")),
            ]),
        );
    }

    #[test]
    fn test_acl_universe_absorbs_later_lines() {
        let packet = BddPacket::default();
        let named = NamedIpSpaces::new();
        check(
            &packet,
            &named,
            acl([
                AclIpSpaceLine::reject(ip("1.1.1.1")),
                AclIpSpaceLine::permit(IpSpace::Universe),
                AclIpSpaceLine::reject(ip("2.2.2.2")),
            ]),
            acl([
                AclIpSpaceLine::reject(ip("1.1.1.1")),
                AclIpSpaceLine::permit(IpSpace::Universe),
            ]),
        );
        check(
            &packet,
            &named,
            acl([
                AclIpSpaceLine::permit(ip("1.1.1.1")),
                AclIpSpaceLine::permit(IpSpace::Wildcard(IpWildcard::ANY)),
                AclIpSpaceLine::reject(ip("1.1.1.1")),
            ]),
            IpSpace::Universe,
        );
    }

    #[test]
    fn test_acl_degenerate() {
        let packet = BddPacket::default();
        let named = NamedIpSpaces::new();
        check(&packet, &named, acl([AclIpSpaceLine::reject(ip("1.1.1.1"))]), IpSpace::Empty);
        check(&packet, &named, acl([]), IpSpace::Empty);
        check(&packet, &named, acl([AclIpSpaceLine::permit(ip("1.1.1.1"))]), ip("1.1.1.1"));
        check(
            &packet,
            &named,
            acl([AclIpSpaceLine::permit(IpSpace::Prefix(Prefix::ZERO))]),
            IpSpace::Universe,
        );
        check(
            &packet,
            &named,
            acl([
                AclIpSpaceLine::reject(ip("1.1.1.1")),
                AclIpSpaceLine::reject(IpSpace::Prefix("2.0.0.0/8".parse().unwrap())),
            ]),
            IpSpace::Empty,
        );
    }

    #[test]
    fn test_acl_keeps_trailing_reject_lines() {
        let packet = BddPacket::default();
        let named = NamedIpSpaces::new();
        let space = acl([
            AclIpSpaceLine::permit(ip("1.1.1.1")),
            AclIpSpaceLine::reject(ip("2.2.2.2")),
        ]);
        check(&packet, &named, space.clone(), space);

        let space = acl([
            AclIpSpaceLine::permit(IpSpace::Prefix("10.0.0.0/8".parse().unwrap())),
            AclIpSpaceLine::permit(IpSpace::Prefix("20.0.0.0/8".parse().unwrap())),
            AclIpSpaceLine::reject(IpSpace::Universe),
        ]);
        check(&packet, &named, space.clone(), space);
        check(
            &packet,
            &named,
            acl([
                AclIpSpaceLine::permit(IpSpace::Prefix("10.0.0.0/8".parse().unwrap())),
                AclIpSpaceLine::reject(IpSpace::Wildcard(IpWildcard::ANY)),
            ]),
            acl([
                AclIpSpaceLine::permit(IpSpace::Prefix("10.0.0.0/8".parse().unwrap())),
                AclIpSpaceLine::reject(IpSpace::Universe),
            ]),
        );
    }

    #[test]
    fn test_leaves() {
        let packet = BddPacket::default();
        let named = NamedIpSpaces::new();
        check(&packet, &named, IpSpace::Prefix("0.0.0.0/0".parse().unwrap()), IpSpace::Universe);
        check(
            &packet,
            &named,
            IpSpace::Prefix("10.0.0.0/8".parse().unwrap()),
            IpSpace::Prefix("10.0.0.0/8".parse().unwrap()),
        );
        check(&packet, &named, IpSpace::Wildcard(IpWildcard::ANY), IpSpace::Universe);
        check(&packet, &named, ip("3.3.3.3"), ip("3.3.3.3"));
        check(&packet, &named, IpSpace::Empty, IpSpace::Empty);
    }

    #[test]
    fn test_wildcard_set() {
        let packet = BddPacket::default();
        let named = NamedIpSpaces::new();
        check(
            &packet,
            &named,
            IpSpace::wildcard_set(
                [wildcard("1.2.1.0/24"), wildcard("2.2.2.2")],
                [wildcard("1.2.0.0/16")],
            ),
            ip("2.2.2.2"),
        );
        check(&packet, &named, IpSpace::wildcard_set([], [wildcard("1.0.0.0/8")]), IpSpace::Empty);
        check(&packet, &named, IpSpace::wildcard_set([IpWildcard::ANY], []), IpSpace::Universe);
        check(
            &packet,
            &named,
            IpSpace::wildcard_set([IpWildcard::ANY], [IpWildcard::ANY]),
            IpSpace::Empty,
        );
        check(
            &packet,
            &named,
            IpSpace::wildcard_set([wildcard("1.2.0.0/16")], [wildcard("1.0.0.0/8")]),
            IpSpace::Empty,
        );
        check(
            &packet,
            &named,
            IpSpace::wildcard_set([wildcard("1.2.0.0/16")], [wildcard("9.0.0.0/8")]),
            IpSpace::Prefix("1.2.0.0/16".parse().unwrap()),
        );
        check(
            &packet,
            &named,
            IpSpace::wildcard_set(
                [wildcard("1.0.0.0/8"), wildcard("3.0.0.0/8")],
                [wildcard("1.2.0.0/16"), wildcard("9.0.0.0/8")],
            ),
            IpSpace::wildcard_set(
                [wildcard("1.0.0.0/8"), wildcard("3.0.0.0/8")],
                [wildcard("1.2.0.0/16")],
            ),
        );
    }

    #[test]
    fn test_references() {
        let packet = BddPacket::default();
        let mut named = NamedIpSpaces::new();
        named.insert("nothing".to_string(), acl([AclIpSpaceLine::reject(ip("1.1.1.1"))]));
        named.insert("all".to_string(), IpSpace::Prefix(Prefix::ZERO));
        named.insert("hosts".to_string(), ip("1.1.1.1"));
        named.insert("loop".to_string(), IpSpace::reference("loop"));

        check(&packet, &named, IpSpace::reference("nothing"), IpSpace::Empty);
        check(&packet, &named, IpSpace::reference("all"), IpSpace::Universe);
        check(&packet, &named, IpSpace::reference("hosts"), IpSpace::reference("hosts"));
        check(
            &packet,
            &named,
            acl([
                AclIpSpaceLine::reject(IpSpace::reference("nothing")),
                AclIpSpaceLine::permit(IpSpace::reference("hosts")),
            ]),
            IpSpace::reference("hosts"),
        );

        let simplifier = IpSpaceSimplifier::new(IpSpaceToBdd::new(packet.bdd(), packet.dst_ip(), &named));
        assert_eq!(
            simplifier.simplify(&IpSpace::reference("loop")),
            Err(ToBddError::CyclicReference("loop".to_string()))
        );
        assert_eq!(
            simplifier.simplify(&IpSpace::reference("missing")),
            Err(ToBddError::UndefinedReference("missing".to_string()))
        );
    }

    #[test]
    fn test_meaning_preserving_and_idempotent() {
        let packet = BddPacket::default();
        let mut named = NamedIpSpaces::new();
        named.insert("lan".to_string(), IpSpace::Prefix("192.168.0.0/16".parse().unwrap()));
        let to_bdd = IpSpaceToBdd::new(packet.bdd(), packet.dst_ip(), &named);
        let simplifier = IpSpaceSimplifier::new(IpSpaceToBdd::new(packet.bdd(), packet.dst_ip(), &named));

        let spaces = [
            acl([
                AclIpSpaceLine::reject(IpSpace::Empty),
                AclIpSpaceLine::reject(ip("192.168.1.1")),
                AclIpSpaceLine::permit(IpSpace::reference("lan")),
                AclIpSpaceLine::permit(IpSpace::wildcard_set(
                    [wildcard("10.0.0.0/8"), wildcard("10.1.0.0/16")],
                    [wildcard("10.1.2.0/24"), wildcard("11.0.0.0/8")],
                )),
                AclIpSpaceLine::reject(IpSpace::Wildcard(IpWildcard::ANY)),
                AclIpSpaceLine::permit(ip("8.8.8.8")),
            ]),
            acl([
                AclIpSpaceLine::permit(acl([AclIpSpaceLine::permit(ip("4.4.4.4"))])),
                AclIpSpaceLine::reject(ip("5.5.5.5")),
            ]),
            IpSpace::wildcard_set(
                [wildcard("0.0.0.5:255.255.255.0"), wildcard("1.2.3.0/24")],
                [wildcard("1.2.3.5")],
            ),
            acl([
                AclIpSpaceLine::permit(IpSpace::wildcard_set([IpWildcard::ANY], [])),
                AclIpSpaceLine::permit(ip("1.1.1.1")),
            ]),
        ];
        let probes = [
            "0.0.0.0",
            "1.2.3.5",
            "1.2.3.6",
            "4.4.4.4",
            "5.5.5.5",
            "8.8.8.8",
            "9.9.9.5",
            "10.0.0.1",
            "10.1.2.3",
            "10.1.3.3",
            "192.168.1.1",
            "192.168.1.2",
            "255.255.255.255",
        ];

        for space in &spaces {
            let simplified = simplifier.simplify(space).unwrap();
            assert_eq!(to_bdd.to_bdd(space), to_bdd.to_bdd(&simplified), "{}", space);
            for probe in probes {
                let p: Ip = probe.parse().unwrap();
                assert_eq!(
                    space.contains_ip(p, &named),
                    simplified.contains_ip(p, &named),
                    "{} at {}",
                    space,
                    probe
                );
            }
            assert_eq!(simplifier.simplify(&simplified).unwrap(), simplified);
        }
    }
}
