//! Sets of IPv4 addresses expressed as trees of set operations.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};

use crate::error::ToBddError;
use crate::ip::{Ip, IpWildcard, Prefix};

/// Named IP spaces that [`IpSpace::Reference`] resolves through.
pub type NamedIpSpaces = HashMap<String, IpSpace>;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LineAction {
    Permit,
    Reject,
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AclIpSpaceLine {
    pub action: LineAction,
    pub space: IpSpace,
}

impl AclIpSpaceLine {
    pub fn permit(space: IpSpace) -> Self {
        Self {
            action: LineAction::Permit,
            space,
        }
    }

    pub fn reject(space: IpSpace) -> Self {
        Self {
            action: LineAction::Reject,
            space,
        }
    }
}

/// A set of IPv4 addresses.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum IpSpace {
    Empty,
    Universe,
    Ip(Ip),
    Prefix(Prefix),
    Wildcard(IpWildcard),
    /// First matching line decides; an address no line matches is excluded.
    Acl(Vec<AclIpSpaceLine>),
    /// Addresses matched by some include and by no exclude.
    WildcardSet {
        include: BTreeSet<IpWildcard>,
        exclude: BTreeSet<IpWildcard>,
    },
    Reference(String),
}

impl IpSpace {
    pub fn wildcard_set(
        include: impl IntoIterator<Item = IpWildcard>,
        exclude: impl IntoIterator<Item = IpWildcard>,
    ) -> Self {
        IpSpace::WildcardSet {
            include: include.into_iter().collect(),
            exclude: exclude.into_iter().collect(),
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        IpSpace::Reference(name.into())
    }

    /// The most specific plain form of a single wildcard.
    pub fn from_wildcard(wildcard: IpWildcard) -> Self {
        if wildcard.is_ip() {
            IpSpace::Ip(wildcard.ip())
        } else if let Some(prefix) = wildcard.to_prefix() {
            IpSpace::Prefix(prefix)
        } else {
            IpSpace::Wildcard(wildcard)
        }
    }

    /// Concrete membership test.
    ///
    /// This walks the tree directly, without BDDs, and serves as the
    /// reference semantics the symbolic compilers must agree with.
    pub fn contains_ip(&self, ip: Ip, named: &NamedIpSpaces) -> Result<bool, ToBddError> {
        let mut visiting = HashSet::new();
        self.contains_ip_(ip, named, &mut visiting)
    }

    fn contains_ip_<'a>(
        &'a self,
        ip: Ip,
        named: &'a NamedIpSpaces,
        visiting: &mut HashSet<&'a str>,
    ) -> Result<bool, ToBddError> {
        Ok(match self {
            IpSpace::Empty => false,
            IpSpace::Universe => true,
            IpSpace::Ip(x) => *x == ip,
            IpSpace::Prefix(prefix) => prefix.contains(ip),
            IpSpace::Wildcard(wildcard) => wildcard.contains(ip),
            IpSpace::Acl(lines) => {
                for line in lines {
                    if line.space.contains_ip_(ip, named, visiting)? {
                        return Ok(line.action == LineAction::Permit);
                    }
                }
                false
            }
            IpSpace::WildcardSet { include, exclude } => {
                include.iter().any(|w| w.contains(ip)) && !exclude.iter().any(|w| w.contains(ip))
            }
            IpSpace::Reference(name) => {
                let space = named
                    .get(name)
                    .ok_or_else(|| ToBddError::UndefinedReference(name.clone()))?;
                if !visiting.insert(name.as_str()) {
                    return Err(ToBddError::CyclicReference(name.clone()));
                }
                let res = space.contains_ip_(ip, named, visiting)?;
                visiting.remove(name.as_str());
                res
            }
        })
    }
}

impl From<Ip> for IpSpace {
    fn from(ip: Ip) -> Self {
        IpSpace::Ip(ip)
    }
}

impl From<Prefix> for IpSpace {
    fn from(prefix: Prefix) -> Self {
        IpSpace::Prefix(prefix)
    }
}

impl From<IpWildcard> for IpSpace {
    fn from(wildcard: IpWildcard) -> Self {
        IpSpace::Wildcard(wildcard)
    }
}

impl Display for IpSpace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IpSpace::Empty => write!(f, "empty"),
            IpSpace::Universe => write!(f, "any"),
            IpSpace::Ip(ip) => write!(f, "{}", ip),
            IpSpace::Prefix(prefix) => write!(f, "{}", prefix),
            IpSpace::Wildcard(wildcard) => write!(f, "{}", wildcard),
            IpSpace::Acl(lines) => {
                write!(f, "acl[")?;
                for (i, line) in lines.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    let action = match line.action {
                        LineAction::Permit => "permit",
                        LineAction::Reject => "reject",
                    };
                    write!(f, "{} {}", action, line.space)?;
                }
                write!(f, "]")
            }
            IpSpace::WildcardSet { include, exclude } => {
                let join = |set: &BTreeSet<IpWildcard>| {
                    set.iter().map(|w| w.to_string()).collect::<Vec<_>>().join(", ")
                };
                write!(f, "{{{}}} - {{{}}}", join(include), join(exclude))
            }
            IpSpace::Reference(name) => write!(f, "${}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ip {
        s.parse().unwrap()
    }

    #[test]
    fn test_acl_first_match() {
        let space = IpSpace::Acl(vec![
            AclIpSpaceLine::reject(IpSpace::Ip(ip("1.1.1.1"))),
            AclIpSpaceLine::permit(IpSpace::Prefix("1.1.1.0/24".parse().unwrap())),
        ]);
        let named = NamedIpSpaces::new();
        assert_eq!(space.contains_ip(ip("1.1.1.1"), &named), Ok(false));
        assert_eq!(space.contains_ip(ip("1.1.1.2"), &named), Ok(true));
        assert_eq!(space.contains_ip(ip("1.1.2.2"), &named), Ok(false));
    }

    #[test]
    fn test_wildcard_set_membership() {
        let space = IpSpace::wildcard_set(
            ["1.0.0.0/8".parse().unwrap()],
            ["1.2.0.0/16".parse().unwrap()],
        );
        let named = NamedIpSpaces::new();
        assert_eq!(space.contains_ip(ip("1.1.0.1"), &named), Ok(true));
        assert_eq!(space.contains_ip(ip("1.2.0.1"), &named), Ok(false));
        assert_eq!(space.to_string(), "{1.0.0.0/8} - {1.2.0.0/16}");
    }

    #[test]
    fn test_reference_resolution() {
        let mut named = NamedIpSpaces::new();
        named.insert("a".to_string(), IpSpace::reference("b"));
        named.insert("b".to_string(), IpSpace::Universe);
        named.insert("loop".to_string(), IpSpace::reference("loop"));

        assert_eq!(IpSpace::reference("a").contains_ip(ip("9.9.9.9"), &named), Ok(true));
        assert_eq!(
            IpSpace::reference("missing").contains_ip(ip("9.9.9.9"), &named),
            Err(ToBddError::UndefinedReference("missing".to_string()))
        );
        assert_eq!(
            IpSpace::reference("loop").contains_ip(ip("9.9.9.9"), &named),
            Err(ToBddError::CyclicReference("loop".to_string()))
        );
    }

    #[test]
    fn test_from_wildcard() {
        assert_eq!(
            IpSpace::from_wildcard("2.2.2.2".parse().unwrap()),
            IpSpace::Ip(ip("2.2.2.2"))
        );
        assert_eq!(
            IpSpace::from_wildcard("1.2.0.0/16".parse().unwrap()),
            IpSpace::Prefix("1.2.0.0/16".parse().unwrap())
        );
        let w: IpWildcard = "1.0.3.0:0.255.0.255".parse().unwrap();
        assert_eq!(IpSpace::from_wildcard(w), IpSpace::Wildcard(w));
    }
}
