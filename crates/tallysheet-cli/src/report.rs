//! Per-report orchestration
//!
//! Each input goes through load -> validate -> clean -> assemble -> style ->
//! save on its own copy of the template grid. Reports share nothing mutable,
//! so a run processes them in parallel.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tallysheet_core::{scan, CellValue, RecordSet};
use tallysheet_engine::ReportPipeline;
use tallysheet_xlsx::{
    load_records, load_template, prepare_output, save_atomic, ReportWriter, StyleConfig,
    StylePlan, Template,
};
use tracing::{error, info};

use crate::clean::{self, CleaningStep};
use crate::config::Config;
use crate::summary::{ReportSummary, RunSummary};
use crate::validate;

/// Regular files in `dir`, skipping lock files (`~$`) and hidden files
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read inputs directory {}", dir.display()))?;

    let mut inputs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("~$") || name.starts_with('.') || !path.is_file() {
            continue;
        }
        inputs.push(path);
    }
    inputs.sort();
    Ok(inputs)
}

/// Everything shared by the reports of one run
pub struct Formatter {
    config: Config,
    pipeline: ReportPipeline,
    template: Template,
    style: StyleConfig,
    steps: Vec<CleaningStep>,
    force: bool,
}

impl Formatter {
    pub fn new(config: Config, force: bool) -> Result<Self> {
        let pipeline =
            ReportPipeline::new(config.engine.clone()).context("Invalid identifier pattern")?;
        let template = load_template(&config.template)
            .with_context(|| format!("Failed to load template {}", config.template.display()))?;
        scan::require_anchors(&template.grid)
            .with_context(|| format!("Unusable template {}", config.template.display()))?;

        let style = config.style();
        let steps = clean::standard_steps(&config);
        Ok(Self {
            config,
            pipeline,
            template,
            style,
            steps,
            force,
        })
    }

    /// Format every input, in parallel
    pub fn run(&self, inputs: &[PathBuf]) -> RunSummary {
        let reports = inputs
            .par_iter()
            .map(|input| {
                let output = self.config.output_path(input);
                self.format(input, &output).unwrap_or_else(|e| {
                    error!(input = %input.display(), error = %format!("{e:#}"), "report skipped");
                    ReportSummary::failed(input.clone(), file_name(&output), &e)
                })
            })
            .collect();
        RunSummary::new(reports)
    }

    /// Coarse identifier of the first raw record
    fn order_id(&self, raw: &RecordSet) -> Option<String> {
        let index = raw.column_index(&self.config.engine.grouping.line_item)?;
        let first = raw.records.first()?;
        self.pipeline
            .group_builder()
            .extractor()
            .order_id(&first.get(index).to_string())
    }

    fn totals(&self, records: &RecordSet) -> BTreeMap<String, f64> {
        self.config
            .engine
            .semantics
            .count
            .iter()
            .filter_map(|column| Some((column.clone(), records.column_sum(column)?)))
            .collect()
    }

    /// Format one input into `output`
    pub fn format(&self, input: &Path, output: &Path) -> Result<ReportSummary> {
        info!(input = %input.display(), "found input");
        prepare_output(output, self.force)?;

        let raw = load_records(input, &self.config.sheet_name)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let missing = validate::missing_columns(&raw, &self.config.required_columns);
        if !missing.is_empty() {
            bail!("Input is missing required columns: {}", missing.join(", "));
        }

        let order_id = self.order_id(&raw);
        let records = clean::clean(raw, &self.steps);

        let mut placeholders = BTreeMap::new();
        if let Some(id) = &order_id {
            placeholders.insert(
                self.style.order_placeholder.clone(),
                CellValue::from(id.as_str()),
            );
        }

        let mut grid = self.template.grid.clone();
        let outcome = self
            .pipeline
            .run(&mut grid, &records, &placeholders)
            .with_context(|| format!("Failed to assemble report from {}", input.display()))?;

        let plan = StylePlan::build(&grid, &outcome, &self.style, &self.template.formats);
        let bytes = ReportWriter::new(&self.template.sheet_name, &plan).to_bytes(&grid)?;
        save_atomic(output, &bytes)
            .with_context(|| format!("Failed to save {}", output.display()))?;

        info!(output = %output.display(), "workbook formatting complete");
        Ok(ReportSummary {
            input: input.to_path_buf(),
            report: file_name(output),
            order_id,
            totals: self.totals(&records),
            error: None,
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
