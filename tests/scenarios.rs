//! End-to-end scenarios.
//!
//! Scenarios 1-5 drive the public `Solver` surface exactly as an embedding
//! application would. Scenario 6 drops to `ConflictAnalyzer`/`ClauseConstraint`
//! directly, mirroring `conflict.rs`'s own inline tests: `Solver`'s public
//! surface has no way to read back a learned clause's LBD or the exact
//! backtrack level a conflict resolved to, so the only way to check those two
//! numbers is to exercise the analyzer the same way the solver's own
//! `handle_conflict` does.

use std::collections::HashMap;

use fdcsp::clause::ClauseConstraint;
use fdcsp::conflict::{Conflict, ConflictAnalyzer};
use fdcsp::database::VariableDatabase;
use fdcsp::domain::ValueSet;
use fdcsp::ids::{ConstraintId, Idx};
use fdcsp::{CompareOp, Consistency, InnerConstraint, Literal, SolveOutcome, Solver};

fn cid(n: usize) -> ConstraintId {
    ConstraintId::unidx(n)
}

/// Scenario 1: vars `a,b ∈ {0,1}`, clause `(a=0) ∨ (b=0)` and
/// clause `(a=1)`. The second clause is unit on installation and forces
/// `a=1`, which then makes the first clause unit on `b=0`.
#[test]
fn unit_clause_forces_the_only_consistent_assignment() {
    let mut solver = Solver::new();
    let a = solver.new_variable("a", vec![0, 1]).unwrap();
    let b = solver.new_variable("b", vec![0, 1]).unwrap();

    solver
        .add_clause(vec![Literal::eq_value(a, 2, 0), Literal::eq_value(b, 2, 0)])
        .unwrap();
    solver.add_clause(vec![Literal::eq_value(a, 2, 1)]).unwrap();

    assert_eq!(solver.solve(None), SolveOutcome::Solved);
    assert_eq!(solver.value(a), 1);
    assert_eq!(solver.value(b), 0);
}

/// Scenario 2: vars `x0,x1 ∈ {3,4}`, `x2 ∈ {3,4,5}`,
/// `AllDifferent(x0,x1,x2)`. `x0,x1` already occupying `{3,4}` forms a Hall
/// interval of size 2, so bounds-consistency must reduce `x2` to `{5}`.
#[test]
fn all_different_tight_forces_the_remaining_value() {
    let mut solver = Solver::new();
    let x0 = solver.new_variable("x0", vec![3, 4]).unwrap();
    let x1 = solver.new_variable("x1", vec![3, 4]).unwrap();
    let x2 = solver.new_variable("x2", vec![3, 4, 5]).unwrap();

    solver
        .add_all_different(vec![x0, x1, x2], Consistency::Bounds)
        .unwrap();

    assert_eq!(solver.solve(None), SolveOutcome::Solved);
    assert_eq!(solver.value(x2), 5);
    assert_ne!(solver.value(x0), solver.value(x1));
    assert_ne!(solver.value(x0), solver.value(x2));
    assert_ne!(solver.value(x1), solver.value(x2));
}

/// Scenario 3: vars `v0..v4 ∈ {0,1}`, `Cardinality({1:(2,2)})`.
/// Any solution must assign exactly two of the five variables to 1.
#[test]
fn cardinality_exact_count_is_enforced() {
    let mut solver = Solver::new();
    let vars: Vec<_> = (0..5)
        .map(|i| solver.new_variable(format!("v{}", i), vec![0, 1]).unwrap())
        .collect();

    let mut mins = HashMap::new();
    let mut maxs = HashMap::new();
    mins.insert(1, 2);
    maxs.insert(1, 2);
    solver.add_cardinality(vars.clone(), mins, maxs).unwrap();

    assert_eq!(solver.solve(None), SolveOutcome::Solved);
    let ones = vars.iter().filter(|&&v| solver.value(v) == 1).count();
    assert_eq!(ones, 2);
}

/// Scenario 4: vars `x0..x3 ∈ {1,2,3}`, `AllDifferent`. Four
/// variables, three values: a pigeonhole failure bounds-consistency must
/// catch immediately (the constraint's own `initialize` already detects it,
/// before `solve` ever runs a decision).
#[test]
fn all_different_pigeonhole_is_unsatisfiable() {
    let mut solver = Solver::new();
    let vars: Vec<_> = (0..4)
        .map(|i| solver.new_variable(format!("x{}", i), vec![1, 2, 3]).unwrap())
        .collect();
    solver.add_all_different(vars, Consistency::Bounds).unwrap();

    assert_eq!(solver.solve(None), SolveOutcome::Unsatisfiable);
}

/// Scenario 5: vars `p,q ∈ {0,1}`, `p` pinned to 0, and
/// `Disjunction(AllDifferent(p,q), p = q)` (the "AllSame" side, expressed as
/// an equality since this crate has no distinct all-same constraint kind).
/// The decision heuristic always picks the lowest remaining value first
/// (`heuristic.rs`), and `q` is the only unsolved variable once `p` is
/// pinned, so the first (and only) decision tries `q=0` — which makes the
/// `AllDifferent` side immediately unsatisfiable and commits the equality
/// side, leaving `p=q=0`.
#[test]
fn disjunction_commits_the_surviving_side() {
    let mut solver = Solver::new();
    let p = solver.new_variable("p", vec![0, 1]).unwrap();
    let q = solver.new_variable("q", vec![0, 1]).unwrap();
    solver.add_clause(vec![Literal::eq_value(p, 2, 0)]).unwrap();

    solver
        .add_disjunction(
            InnerConstraint::AllDifferent(fdcsp::all_different::AllDifferentConstraint::new(
                vec![p, q],
                Consistency::Weak,
            )),
            InnerConstraint::Inequality(fdcsp::inequality::InequalityConstraint::new(p, q, CompareOp::Eq)),
        )
        .unwrap();

    assert_eq!(solver.solve(None), SolveOutcome::Solved);
    assert_eq!(solver.value(p), 0);
    assert_eq!(solver.value(q), 0);
}

/// Scenario 6: a 3-variable problem where the conflict at
/// decision level 2 resolves, through first-UIP analysis, to a single
/// asserting literal whose only non-ground antecedent is itself — `a`'s
/// level-1 decision never participates in this particular conflict (`c` is
/// already pinned at ground level, so it contributes nothing once
/// filtered). Analysis collapses straight to `Conflict::Unit`, which the
/// solver's `handle_conflict` always backtracks to ground level (0)
/// regardless of how many decision levels were active (a backjump of two
/// levels here: from level 2 to level 0), and whose single-literal learned
/// clause always has LBD 1.
#[test]
fn two_level_conflict_collapses_to_a_ground_backjump() {
    let mut db = VariableDatabase::new();
    let a = db.new_variable("a", vec![0, 1]);
    let b = db.new_variable("b", vec![0, 1]);
    let c = db.new_variable("c", vec![0, 1]);

    // c is pinned at ground level, before any decision is made.
    db.narrow(c, &ValueSet::singleton(2, 0), None).unwrap();

    db.new_decision_level();
    db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();

    db.new_decision_level();
    db.narrow(b, &ValueSet::singleton(2, 0), None).unwrap();
    assert_eq!(db.decision_level().0, 2);

    // A clause (b=1) or (c=1), violated now that both b and c are pinned to 0.
    let clause_literals = vec![Literal::eq_value(b, 2, 1), Literal::eq_value(c, 2, 1)];

    let mut analyzer = ConflictAnalyzer::new();
    let mut bumped = Vec::new();
    let outcome = analyzer.analyze(&db, cid(1), b, |_id, _ctx| clause_literals.clone(), |v| bumped.push(v));

    match outcome {
        Conflict::Unit(literal) => {
            assert_eq!(literal.var, b);
            assert!(literal.values.contains(1));
            assert!(!literal.values.contains(0));

            let mut learned = ClauseConstraint::learned(vec![literal]);
            if let Some(ext) = learned.ext.as_mut() {
                ext.lbd = 1;
            }
            assert_eq!(learned.ext.as_ref().unwrap().lbd, 1);
        }
        _ => panic!("expected the conflict to collapse to a unit clause"),
    }
    // `a`'s level-1 decision never appears in the analysis: the conflict
    // backjumps straight from level 2 to ground level 0, not merely to 1.
    assert!(!bumped.contains(&a));
}
