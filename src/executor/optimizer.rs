//! Optimization rules
//!
//! Each rule looks at the structure of a query and the catalog metadata of
//! its table and either reports a finding or stays silent. Rules never see
//! each other's output, so the order they run in does not matter.
//!
//! The improvement figures are fixed heuristics multiplied together. They are
//! not a calibrated cost model and should only be compared with each other.

use crate::catalog::TableMetadata;
use crate::sql::QueryStructure;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Selectivity assumed for any pushed-down predicate
pub const DEFAULT_SELECTIVITY: f64 = 0.1;

/// Data reduction assumed for grouped aggregation
pub const AGGREGATION_REDUCTION: f64 = 0.9;

const PRUNING_FACTOR: f64 = 1.3;
const PUSHDOWN_FACTOR: f64 = 1.5;
const JOIN_FACTOR: f64 = 1.0;
const AGGREGATION_FACTOR: f64 = 1.6;
const SPEEDUP_PER_CPU: f64 = 0.8;
const MAX_SPEEDUP: f64 = 6.0;

/// The closed set of optimization rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationRule {
    ColumnPruning,
    PredicatePushdown,
    JoinOptimization,
    AggregationOptimization,
    ParallelExecution,
}

impl OptimizationRule {
    pub const ALL: [OptimizationRule; 5] = [
        OptimizationRule::ColumnPruning,
        OptimizationRule::PredicatePushdown,
        OptimizationRule::JoinOptimization,
        OptimizationRule::AggregationOptimization,
        OptimizationRule::ParallelExecution,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OptimizationRule::ColumnPruning => "column_pruning",
            OptimizationRule::PredicatePushdown => "predicate_pushdown",
            OptimizationRule::JoinOptimization => "join_optimization",
            OptimizationRule::AggregationOptimization => "aggregation_optimization",
            OptimizationRule::ParallelExecution => "parallel_execution",
        }
    }

    /// Run the rule; `None` means it found nothing to do
    pub fn analyze(
        &self,
        query: &QueryStructure,
        table: &TableMetadata,
        ctx: &RuleContext,
    ) -> Option<Optimization> {
        match self {
            OptimizationRule::ColumnPruning => {
                if query.selects_all() {
                    return None;
                }
                let unused: Vec<String> = table
                    .columns
                    .keys()
                    .filter(|name| !query.projects(name))
                    .cloned()
                    .collect();
                if unused.is_empty() {
                    return None;
                }
                let estimated_savings_bytes = unused
                    .iter()
                    .filter_map(|name| table.get_column(name))
                    .map(|c| c.size_bytes)
                    .sum();
                Some(Optimization::ColumnPruning {
                    unused_columns: unused,
                    estimated_savings_bytes,
                })
            }
            OptimizationRule::PredicatePushdown => {
                let pushdown: Vec<String> = query
                    .where_conditions
                    .iter()
                    .filter(|c| c.is_comparison())
                    .map(|c| c.text.clone())
                    .collect();
                if pushdown.is_empty() {
                    return None;
                }
                Some(Optimization::PredicatePushdown {
                    pushdown_predicates: pushdown,
                    estimated_selectivity: DEFAULT_SELECTIVITY,
                })
            }
            OptimizationRule::JoinOptimization => {
                query.has_join.then(|| Optimization::JoinOptimization {
                    strategy: "hash_join".to_string(),
                    cost_estimate: "low".to_string(),
                })
            }
            OptimizationRule::AggregationOptimization => {
                query
                    .has_group_by
                    .then(|| Optimization::AggregationOptimization {
                        strategy: "parallel_aggregation".to_string(),
                        estimated_reduction: AGGREGATION_REDUCTION,
                    })
            }
            OptimizationRule::ParallelExecution => {
                let cpus = ctx.cpu_count.max(1);
                Some(Optimization::ParallelExecution {
                    parallel_degree: cpus.min(ctx.max_parallel_degree.max(1)),
                    estimated_speedup: (cpus as f64 * SPEEDUP_PER_CPU).min(MAX_SPEEDUP),
                })
            }
        }
    }
}

impl fmt::Display for OptimizationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Environment the rules are evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleContext {
    pub cpu_count: usize,
    pub max_parallel_degree: usize,
}

/// A finding reported by one rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Optimization {
    ColumnPruning {
        unused_columns: Vec<String>,
        estimated_savings_bytes: usize,
    },
    PredicatePushdown {
        pushdown_predicates: Vec<String>,
        estimated_selectivity: f64,
    },
    JoinOptimization {
        strategy: String,
        cost_estimate: String,
    },
    AggregationOptimization {
        strategy: String,
        estimated_reduction: f64,
    },
    ParallelExecution {
        parallel_degree: usize,
        estimated_speedup: f64,
    },
}

impl Optimization {
    pub fn rule(&self) -> OptimizationRule {
        match self {
            Optimization::ColumnPruning { .. } => OptimizationRule::ColumnPruning,
            Optimization::PredicatePushdown { .. } => OptimizationRule::PredicatePushdown,
            Optimization::JoinOptimization { .. } => OptimizationRule::JoinOptimization,
            Optimization::AggregationOptimization { .. } => {
                OptimizationRule::AggregationOptimization
            }
            Optimization::ParallelExecution { .. } => OptimizationRule::ParallelExecution,
        }
    }

    /// Multiplier this finding contributes to the estimated improvement
    pub fn improvement_factor(&self) -> f64 {
        match self {
            Optimization::ColumnPruning { .. } => PRUNING_FACTOR,
            Optimization::PredicatePushdown { .. } => PUSHDOWN_FACTOR,
            Optimization::JoinOptimization { .. } => JOIN_FACTOR,
            Optimization::AggregationOptimization { .. } => AGGREGATION_FACTOR,
            Optimization::ParallelExecution {
                estimated_speedup, ..
            } => *estimated_speedup,
        }
    }
}

/// Conceptual execution stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStage {
    ColumnPruning,
    PredicatePushdown,
    ParallelScan,
    ResultAssembly,
}

impl PlanStage {
    pub const PIPELINE: [PlanStage; 4] = [
        PlanStage::ColumnPruning,
        PlanStage::PredicatePushdown,
        PlanStage::ParallelScan,
        PlanStage::ResultAssembly,
    ];
}

/// Execution plan: always the same four stages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub stages: Vec<PlanStage>,
    pub parallel_degree: usize,
}

impl ExecutionPlan {
    pub fn new(parallel_degree: usize) -> Self {
        Self {
            stages: PlanStage::PIPELINE.to_vec(),
            parallel_degree,
        }
    }
}

/// Output of the planner for one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub original_query: String,
    /// Original text with an annotation naming the fired rules
    pub optimized_query: String,
    pub optimizations: BTreeMap<OptimizationRule, Optimization>,
    /// Product of the fired rules' improvement factors
    pub estimated_improvement: f64,
    pub execution_plan: ExecutionPlan,
}

impl OptimizationResult {
    /// Assemble a result from the findings of the rules that fired
    pub fn from_findings(
        original_query: &str,
        optimizations: BTreeMap<OptimizationRule, Optimization>,
    ) -> Self {
        let estimated_improvement = optimizations
            .values()
            .map(Optimization::improvement_factor)
            .product();

        let parallel_degree = match optimizations.get(&OptimizationRule::ParallelExecution) {
            Some(Optimization::ParallelExecution {
                parallel_degree, ..
            }) => *parallel_degree,
            _ => 1,
        };

        let original = original_query.trim();
        let optimized_query = if optimizations.is_empty() {
            original.to_string()
        } else {
            let names: Vec<&str> = optimizations.keys().map(|r| r.name()).collect();
            format!("{} /* optimized: {} */", original, names.join(", "))
        };

        Self {
            original_query: original_query.to_string(),
            optimized_query,
            optimizations,
            estimated_improvement,
            execution_plan: ExecutionPlan::new(parallel_degree),
        }
    }

    /// Did `rule` report a finding?
    pub fn fired(&self, rule: OptimizationRule) -> bool {
        self.optimizations.contains_key(&rule)
    }
}
