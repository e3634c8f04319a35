//! Report pipeline
//!
//! Runs GroupBuilder -> RowRenderer -> AggregationResolver -> placeholders ->
//! MarkupStripper over a working copy of the template grid. The caller's grid
//! is replaced only when every stage succeeds, so a failed report never leaves
//! a half-aggregated grid behind for persistence.

use std::collections::BTreeMap;
use tallysheet_core::{scan, CellRef, CellValue, Grid, RecordSet, RenderedExtent, ReportError};
use tracing::info;

use crate::aggregate::{self, Resolution};
use crate::group::GroupBuilder;
use crate::{placeholder, render, strip, EngineConfig};

/// Everything the styling and persistence steps need to know about a run
#[derive(Clone, Debug, PartialEq)]
pub struct ReportOutcome {
    pub extent: RenderedExtent,
    pub groups: usize,
    pub subtotalled_groups: usize,
    pub resolution: Resolution,
    /// Placeholder cells that received a value
    pub placeholders: Vec<(CellRef, String)>,
    /// Tag cells cleared at the end, with their former text
    pub stripped: Vec<(CellRef, String)>,
}

/// Configured, reusable report assembly pipeline
#[derive(Clone, Debug)]
pub struct ReportPipeline {
    builder: GroupBuilder,
    config: EngineConfig,
}

impl ReportPipeline {
    pub fn new(config: EngineConfig) -> Result<Self, regex::Error> {
        let builder = GroupBuilder::new(config.grouping.clone())?;
        Ok(Self { builder, config })
    }

    pub fn group_builder(&self) -> &GroupBuilder {
        &self.builder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Assemble a report from `records` into `grid`.
    pub fn run(
        &self,
        grid: &mut Grid,
        records: &RecordSet,
        placeholders: &BTreeMap<String, CellValue>,
    ) -> Result<ReportOutcome, ReportError> {
        scan::require_anchors(grid)?;
        let groups = self.builder.build(records)?;

        let mut work = grid.clone();
        let extent = render::render(&mut work, &records.columns, &groups)?;
        let resolution = aggregate::resolve(&mut work, extent, &self.config.semantics)?;
        let filled = placeholder::fill(&mut work, placeholders);
        let stripped = strip::strip(&mut work);
        *grid = work;

        let outcome = ReportOutcome {
            extent,
            groups: groups.len(),
            subtotalled_groups: groups.iter().filter(|g| g.is_subtotalled()).count(),
            resolution,
            placeholders: filled,
            stripped,
        };
        info!(
            records = records.len(),
            groups = outcome.groups,
            subtotals = outcome.subtotalled_groups,
            extent = %outcome.extent,
            "report assembled"
        );
        Ok(outcome)
    }
}
