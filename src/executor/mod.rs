//! Query execution module
//!
//! This module contains the rule-based planner and the predicate executor.

pub mod executor;
pub mod optimizer;
pub mod planner;

pub use executor::{filter_batch, resolve_predicate, PredicatePolicy};
pub use optimizer::{
    ExecutionPlan, Optimization, OptimizationResult, OptimizationRule, PlanStage, RuleContext,
};
pub use planner::QueryPlanner;
