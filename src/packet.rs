//! BDD variables for packet header fields.
//!
//! Each integer header field is a vector of BDD variables, most significant
//! bit first. Field order fixes the variable order, and with it the size of
//! every diagram built over the packet:
//!
//! ```text
//! ip protocol (8) | dst ip (32) | src ip (32) | dst port (16) | src port (16)
//! icmp code (8)   | icmp type (8) | tcp ack cwr ece fin psh rst syn urg
//! ```

use log::debug;

use crate::acl::{SubRange, TcpFlag};
use crate::bdd::{Bdd, BddConfig};
use crate::ip::{network_mask, Ip};
use crate::reference::Ref;

/// An unsigned integer encoded as a vector of BDD variables.
#[derive(Debug, Clone)]
pub struct BddInteger {
    /// Variables, most significant bit first.
    vars: Vec<u32>,
}

impl BddInteger {
    /// Allocates `width` consecutive variables starting at `first`.
    pub fn new(first: u32, width: u32) -> Self {
        assert!((1..=32).contains(&width), "Width must be in range 1..=32");
        Self {
            vars: (first..first + width).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.vars.len() as u32
    }

    pub fn vars(&self) -> &[u32] {
        &self.vars
    }

    /// Value of bit `i` of `value`, counting from the most significant bit.
    fn bit(&self, value: u32, i: usize) -> bool {
        let shift = self.width() as usize - 1 - i;
        (value >> shift) & 1 == 1
    }

    fn literal(&self, value: u32, i: usize) -> i32 {
        let var = self.vars[i] as i32;
        if self.bit(value, i) {
            var
        } else {
            -var
        }
    }

    /// The field equals `value`.
    pub fn value(&self, bdd: &Bdd, value: u32) -> Ref {
        bdd.cube((0..self.vars.len()).map(|i| self.literal(value, i)))
    }

    /// The top `len` bits of the field equal those of `value`.
    pub fn prefix(&self, bdd: &Bdd, value: u32, len: u32) -> Ref {
        assert!(len <= self.width());
        bdd.cube((0..len as usize).map(|i| self.literal(value, i)))
    }

    /// The field matches `value` on every bit not set in `dont_care`.
    pub fn wildcard(&self, bdd: &Bdd, value: u32, dont_care: u32) -> Ref {
        bdd.cube(
            (0..self.vars.len())
                .filter(|&i| !self.bit(dont_care, i))
                .map(|i| self.literal(value, i)),
        )
    }

    /// The field is less than or equal to `value`.
    pub fn leq(&self, bdd: &Bdd, value: u32) -> Ref {
        // Built from the least significant bit up: `acc` holds the
        // comparison restricted to the bits processed so far.
        let mut acc = bdd.one();
        for i in (0..self.vars.len()).rev() {
            let x = bdd.mk_var(self.vars[i]);
            acc = if self.bit(value, i) {
                bdd.apply_ite(x, acc, bdd.one())
            } else {
                bdd.apply_ite(x, bdd.zero(), acc)
            };
        }
        acc
    }

    /// The field is greater than or equal to `value`.
    pub fn geq(&self, bdd: &Bdd, value: u32) -> Ref {
        let mut acc = bdd.one();
        for i in (0..self.vars.len()).rev() {
            let x = bdd.mk_var(self.vars[i]);
            acc = if self.bit(value, i) {
                bdd.apply_ite(x, acc, bdd.zero())
            } else {
                bdd.apply_ite(x, bdd.one(), acc)
            };
        }
        acc
    }

    /// Largest value the field can hold.
    pub fn max_value(&self) -> u32 {
        u32::MAX >> (32 - self.width())
    }

    /// The field lies in `start..=end`.
    ///
    /// Bounds above [`max_value`][Self::max_value] are clamped to it.
    pub fn range(&self, bdd: &Bdd, start: u32, end: u32) -> Ref {
        let end = end.min(self.max_value());
        if start > end {
            return bdd.zero();
        }
        if start == end {
            return self.value(bdd, start);
        }
        let lower = if start == 0 { bdd.one() } else { self.geq(bdd, start) };
        bdd.apply_and(lower, self.leq(bdd, end))
    }
}

/// The header fields of a packet, each backed by its own BDD variables.
///
/// Owns the [`Bdd`] manager: every formula produced for this packet lives
/// there and can only be combined with formulas of the same packet.
#[derive(Debug)]
pub struct BddPacket {
    bdd: Bdd,
    ip_protocol: BddInteger,
    dst_ip: BddInteger,
    src_ip: BddInteger,
    dst_port: BddInteger,
    src_port: BddInteger,
    icmp_code: BddInteger,
    icmp_type: BddInteger,
    tcp_flags: [u32; 8],
}

impl BddPacket {
    pub const NUM_VARS: usize = 8 + 32 + 32 + 16 + 16 + 8 + 8 + 8;

    pub fn new(config: BddConfig) -> Self {
        let mut next = 1;
        let mut alloc = |width: u32| {
            let field = BddInteger::new(next, width);
            next += width;
            field
        };

        let ip_protocol = alloc(8);
        let dst_ip = alloc(32);
        let src_ip = alloc(32);
        let dst_port = alloc(16);
        let src_port = alloc(16);
        let icmp_code = alloc(8);
        let icmp_type = alloc(8);
        let flags = alloc(8);
        let mut tcp_flags = [0; 8];
        tcp_flags.copy_from_slice(flags.vars());

        debug!("Allocated {} packet variables", next - 1);

        Self {
            bdd: Bdd::new(config),
            ip_protocol,
            dst_ip,
            src_ip,
            dst_port,
            src_port,
            icmp_code,
            icmp_type,
            tcp_flags,
        }
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    pub fn ip_protocol(&self) -> &BddInteger {
        &self.ip_protocol
    }
    pub fn dst_ip(&self) -> &BddInteger {
        &self.dst_ip
    }
    pub fn src_ip(&self) -> &BddInteger {
        &self.src_ip
    }
    pub fn dst_port(&self) -> &BddInteger {
        &self.dst_port
    }
    pub fn src_port(&self) -> &BddInteger {
        &self.src_port
    }
    pub fn icmp_code(&self) -> &BddInteger {
        &self.icmp_code
    }
    pub fn icmp_type(&self) -> &BddInteger {
        &self.icmp_type
    }

    pub fn tcp_flag(&self, flag: TcpFlag) -> Ref {
        self.bdd.mk_var(self.tcp_flags[flag as usize])
    }

    /// Disjunction of `field ∈ range` over `ranges`.
    pub fn ranges(&self, field: &BddInteger, ranges: &[SubRange]) -> Ref {
        self.bdd
            .apply_or_many(ranges.iter().map(|r| field.range(&self.bdd, r.start, r.end)))
    }

    /// Number of addresses `f` admits, for a formula over one IP field only.
    pub fn count_ips(&self, f: Ref) -> num_bigint::BigUint {
        // Every variable outside the field is a don't-care for `f`, so the
        // full-space count over-counts by exactly 2^(other vars).
        let total = self.bdd.sat_count(f, Self::NUM_VARS);
        total >> (Self::NUM_VARS - 32)
    }

    /// Packets whose `field` lies in the given address prefix.
    pub fn ip_prefix(&self, field: &BddInteger, ip: Ip, len: u8) -> Ref {
        field.prefix(&self.bdd, ip.bits() & network_mask(len), len as u32)
    }
}

impl Default for BddPacket {
    fn default() -> Self {
        BddPacket::new(BddConfig::default())
    }
}
