//! Query planner for colstore
//!
//! This module parses query text and runs every optimization rule against
//! the catalog metadata of the target table. Planning is a pure function of
//! the query text, the metadata and the CPU count fixed at construction.

use super::optimizer::{OptimizationResult, OptimizationRule, RuleContext};
use crate::catalog::{MetadataCatalog, TableMetadata};
use crate::error::Result;
use crate::sql::{parse_query, QueryStructure};
use std::collections::BTreeMap;
use std::thread;

/// Upper bound on the parallel degree of a plan
pub const DEFAULT_MAX_PARALLEL_DEGREE: usize = 8;

/// Rule-based query planner
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    ctx: RuleContext,
}

impl QueryPlanner {
    /// Create a planner for a machine with `cpu_count` CPUs
    pub fn new(cpu_count: usize) -> Self {
        Self {
            ctx: RuleContext {
                cpu_count: cpu_count.max(1),
                max_parallel_degree: DEFAULT_MAX_PARALLEL_DEGREE,
            },
        }
    }

    pub fn with_max_parallel_degree(mut self, degree: usize) -> Self {
        self.ctx.max_parallel_degree = degree.max(1);
        self
    }

    pub fn cpu_count(&self) -> usize {
        self.ctx.cpu_count
    }

    /// Parse query text into its structure
    pub fn parse(&self, query: &str) -> Result<QueryStructure> {
        parse_query(query)
    }

    /// Parse and optimize a query against known table metadata
    pub fn optimize(&self, query: &str, table: &TableMetadata) -> Result<OptimizationResult> {
        let structure = self.parse(query)?;
        Ok(self.optimize_parsed(&structure, query, table))
    }

    /// Optimize an already parsed query
    pub fn optimize_parsed(
        &self,
        structure: &QueryStructure,
        query: &str,
        table: &TableMetadata,
    ) -> OptimizationResult {
        let findings: BTreeMap<_, _> = OptimizationRule::ALL
            .iter()
            .filter_map(|rule| {
                rule.analyze(structure, table, &self.ctx)
                    .map(|finding| (*rule, finding))
            })
            .collect();

        OptimizationResult::from_findings(query, findings)
    }

    /// Look `table` up in the catalog and optimize the query against it
    pub fn plan(
        &self,
        query: &str,
        table: &str,
        catalog: &MetadataCatalog,
    ) -> Result<OptimizationResult> {
        let metadata = catalog.get(table)?;
        self.optimize(query, &metadata)
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        let cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(cpus)
    }
}
