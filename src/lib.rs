//! # netbdd: symbolic reachability core
//!
//! **`netbdd`** answers questions about sets of packets without enumerating
//! them. Sets of addresses ([`IpSpace`][crate::ip_space::IpSpace]) and packet
//! predicates ([`AclLineMatchExpr`][crate::acl::AclLineMatchExpr]) are
//! compiled into **Binary Decision Diagrams**, whose canonical form makes
//! equivalence a handle comparison. On top of that:
//!
//! - the [`simplifier`] rewrites an IP space into a smaller equivalent one,
//! - the [`builders`] accumulate minimal conjunctions and disjunctions,
//!   dropping terms that no longer contribute.
//!
//! Separately, a [`TraceDag`][crate::trace_dag::TraceDag] stores all traces of
//! a simulated packet through a multi-path network in space linear in the
//! number of distinct hops, while the number of traces may be exponential.
//!
//! ## Basic Usage
//!
//! ```rust
//! use netbdd::ip_space::{IpSpace, NamedIpSpaces};
//! use netbdd::packet::BddPacket;
//! use netbdd::simplifier::IpSpaceSimplifier;
//! use netbdd::to_bdd::IpSpaceToBdd;
//!
//! // 1. One packet encoding (and BDD manager) per query
//! let packet = BddPacket::default();
//! let named = NamedIpSpaces::new();
//! let to_bdd = IpSpaceToBdd::new(packet.bdd(), packet.dst_ip(), &named);
//!
//! // 2. Compile and compare
//! let space = IpSpace::wildcard_set(
//!     ["1.2.1.0/24".parse().unwrap(), "2.2.2.2".parse().unwrap()],
//!     ["1.2.0.0/16".parse().unwrap()],
//! );
//! let f = to_bdd.to_bdd(&space).unwrap();
//! let g = to_bdd.to_bdd(&IpSpace::Ip("2.2.2.2".parse().unwrap())).unwrap();
//! assert_eq!(f, g);
//!
//! // 3. Simplify
//! let simplifier = IpSpaceSimplifier::new(to_bdd);
//! assert_eq!(simplifier.simplify(&space).unwrap().to_string(), "2.2.2.2");
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]**: The [`Bdd`][crate::bdd::Bdd] manager with hash-consed nodes and complement edges.
//! - **[`packet`]**: Assignment of BDD variables to packet header fields.
//! - **[`to_bdd`]**: Compilers from IP spaces and match expressions to BDDs.
//! - **[`trace_dag`]**: Trace DAG construction, counting and enumeration.
//! - **[`dot`]**: Visualizing trace DAGs using Graphviz.

pub mod acl;
pub mod bdd;
pub mod builders;
pub mod cache;
pub mod dot;
pub mod error;
pub mod ip;
pub mod ip_space;
pub mod packet;
pub mod reference;
pub mod simplifier;
pub mod to_bdd;
pub mod trace;
pub mod trace_dag;
