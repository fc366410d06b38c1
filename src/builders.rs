//! Incremental builders for minimal conjunctions and disjunctions of match
//! expressions.
//!
//! A builder compiles every added term and keeps only those that still
//! contribute. A term absorbed by a later, stronger one is dropped again.

use log::debug;

use crate::acl::AclLineMatchExpr;
use crate::error::ToBddError;
use crate::reference::Ref;
use crate::to_bdd::AclLineMatchExprToBdd;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Combinator {
    And,
    Or,
}

/// State shared by both builders.
struct MatchExprsBuilder<'a> {
    to_bdd: &'a AclLineMatchExprToBdd<'a>,
    combinator: Combinator,
    accumulated: Ref,
    /// Kept terms with their formulas, in insertion order.
    kept: Vec<(AclLineMatchExpr, Ref)>,
    kept_union: Ref,
}

impl<'a> MatchExprsBuilder<'a> {
    fn new(to_bdd: &'a AclLineMatchExprToBdd<'a>, combinator: Combinator) -> Self {
        let bdd = to_bdd.bdd();
        let accumulated = match combinator {
            Combinator::And => bdd.one(),
            Combinator::Or => bdd.zero(),
        };
        Self {
            to_bdd,
            combinator,
            accumulated,
            kept: Vec::new(),
            kept_union: bdd.zero(),
        }
    }

    fn combine(&self, u: Ref, v: Ref) -> Ref {
        let bdd = self.to_bdd.bdd();
        match self.combinator {
            Combinator::And => bdd.apply_and(u, v),
            Combinator::Or => bdd.apply_or(u, v),
        }
    }

    fn short_circuit(&self) -> Ref {
        let bdd = self.to_bdd.bdd();
        match self.combinator {
            Combinator::And => bdd.zero(),
            Combinator::Or => bdd.one(),
        }
    }

    fn is_short_circuited(&self) -> bool {
        self.accumulated == self.short_circuit()
    }

    fn add(&mut self, expr: AclLineMatchExpr) -> Result<(), ToBddError> {
        if self.is_short_circuited() || self.kept.iter().any(|(e, _)| *e == expr) {
            return Ok(());
        }
        let f = self.to_bdd.to_bdd(&expr)?;
        self.add_compiled(expr, f);
        Ok(())
    }

    fn add_compiled(&mut self, expr: AclLineMatchExpr, f: Ref) {
        let combined = self.combine(self.accumulated, f);
        if combined == self.accumulated {
            debug!("Skipping redundant {}", expr);
            return;
        }

        let bdd = self.to_bdd.bdd();
        if !self.kept.is_empty() && bdd.intersects(f, self.kept_union) {
            let before = self.kept.len();
            let mut kept = std::mem::take(&mut self.kept);
            kept.retain(|(old, old_f)| {
                let absorbed = self.combine(*old_f, f) == f;
                if absorbed {
                    debug!("Dropping {}, absorbed by {}", old, expr);
                }
                !absorbed
            });
            self.kept = kept;
            if self.kept.len() != before {
                self.kept_union = bdd.apply_or_many(self.kept.iter().map(|&(_, g)| g));
            }
        }

        debug!("Keeping {}", expr);
        self.kept.push((expr, f));
        self.accumulated = combined;
        self.kept_union = bdd.apply_or(self.kept_union, f);
    }

    fn build(&self) -> AclLineMatchExpr {
        let (short_circuit, neutral) = match self.combinator {
            Combinator::And => (AclLineMatchExpr::False, AclLineMatchExpr::True),
            Combinator::Or => (AclLineMatchExpr::True, AclLineMatchExpr::False),
        };
        self.to_bdd.bdd().log_stats("Builder");
        if self.is_short_circuited() {
            return short_circuit;
        }
        match self.kept.as_slice() {
            [] => neutral,
            [(expr, _)] => expr.clone(),
            kept => {
                let exprs = kept.iter().map(|(e, _)| e.clone()).collect();
                match self.combinator {
                    Combinator::And => AclLineMatchExpr::And(exprs),
                    Combinator::Or => AclLineMatchExpr::Or(exprs),
                }
            }
        }
    }
}

/// Builds a minimal conjunction.
pub struct ConjunctsBuilder<'a> {
    base: MatchExprsBuilder<'a>,
}

impl<'a> ConjunctsBuilder<'a> {
    pub fn new(to_bdd: &'a AclLineMatchExprToBdd<'a>) -> Self {
        Self {
            base: MatchExprsBuilder::new(to_bdd, Combinator::And),
        }
    }

    pub fn add(&mut self, expr: AclLineMatchExpr) -> Result<(), ToBddError> {
        self.base.add(expr)
    }

    /// Number of terms currently kept.
    pub fn len(&self) -> usize {
        self.base.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.kept.is_empty()
    }

    /// Formula of everything added so far.
    pub fn accumulated(&self) -> Ref {
        self.base.accumulated
    }

    pub fn build(&self) -> AclLineMatchExpr {
        self.base.build()
    }
}

/// Builds a minimal disjunction.
///
/// Compound terms are split: a negation is pushed inward first, and an `Or`
/// is added one disjunct at a time so that each can be dropped on its own.
pub struct DisjunctsBuilder<'a> {
    base: MatchExprsBuilder<'a>,
}

impl<'a> DisjunctsBuilder<'a> {
    pub fn new(to_bdd: &'a AclLineMatchExprToBdd<'a>) -> Self {
        Self {
            base: MatchExprsBuilder::new(to_bdd, Combinator::Or),
        }
    }

    pub fn add(&mut self, expr: AclLineMatchExpr) -> Result<(), ToBddError> {
        if self.base.is_short_circuited() {
            return Ok(());
        }
        let bdd = self.base.to_bdd.bdd();
        let f = self.base.to_bdd.to_bdd(&expr)?;
        if bdd.is_one(bdd.apply_or(f, self.base.accumulated)) {
            return self.base.add(expr);
        }

        match expr.negate_inward() {
            AclLineMatchExpr::Or(disjuncts) => {
                for d in disjuncts {
                    self.add(d)?;
                }
                Ok(())
            }
            expr => self.base.add(expr),
        }
    }

    /// Number of terms currently kept.
    pub fn len(&self) -> usize {
        self.base.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.kept.is_empty()
    }

    /// Formula of everything added so far.
    pub fn accumulated(&self) -> Ref {
        self.base.accumulated
    }

    pub fn build(&self) -> AclLineMatchExpr {
        self.base.build()
    }
}
