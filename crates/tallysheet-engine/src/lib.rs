//! # tallysheet-engine
//!
//! Tag-driven report assembly over a [`tallysheet_core::Grid`].
//!
//! This crate provides:
//! - Record grouping with a two-tier identifier extractor ([`group`])
//! - Row rendering into the template's data region ([`render`])
//! - Subtotal/total formula synthesis ([`aggregate`])
//! - Placeholder substitution and tag stripping ([`placeholder`], [`strip`])
//! - The [`ReportPipeline`] that sequences them
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::collections::BTreeMap;
//! use tallysheet_engine::{EngineConfig, ReportPipeline};
//!
//! let pipeline = ReportPipeline::new(EngineConfig::default())?;
//! let outcome = pipeline.run(&mut grid, &records, &BTreeMap::new())?;
//! println!("rendered {}", outcome.extent);
//! ```

pub mod aggregate;
pub mod group;
pub mod placeholder;
pub mod pipeline;
pub mod render;
pub mod strip;

pub use aggregate::{ColumnSemantic, ColumnSemantics, Resolution};
pub use group::{Group, GroupBuilder, GroupingConfig, Identifier, IdentifierExtractor};
pub use pipeline::{ReportOutcome, ReportPipeline};

use serde::{Deserialize, Serialize};

/// Engine settings: grouping columns/patterns and column semantics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grouping: GroupingConfig,
    pub semantics: ColumnSemantics,
}
