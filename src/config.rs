//! Column layouts and output location.
//!
//! Two input schemas exist in the wild. `hazard` files carry a hazard ratio
//! test p-value and have their descriptions in columns 10/11; `basic` files
//! lack that column and have descriptions in 9/10. Either preset can be
//! replaced by a JSON config file whose columns may be given as zero-based
//! indices or as header names:
//!
//! ```json
//! {
//!   "columns": { "source_desc": "source_name", "target_desc": "target_name", "hrtest_p": null },
//!   "reformat": false,
//!   "output": "working_dir"
//! }
//! ```
//!
//! Fields left out of the file keep their `hazard` value.

use crate::error::{ConvertError, Result};
use csv::StringRecord;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_INPUT: &str = "all.edges.csv";
pub const OUTPUT_FILE_NAME: &str = "all.edges.csv.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Layout {
    /// Reformatted statistics, `HRtest_p` column, output beside the input
    Hazard,
    /// Raw statistics, no `HRtest_p`, output in the working directory
    Basic,
}

impl Layout {
    pub fn config(self) -> ConvertConfig {
        let idx = ColumnRef::Index;
        match self {
            Layout::Hazard => ConvertConfig {
                columns: ColumnMap {
                    source: idx(0),
                    target: idx(1),
                    coef: idx(2),
                    exp_coef: idx(3),
                    se_coef: idx(4),
                    z: idx(5),
                    pr: idx(6),
                    n: idx(7),
                    hrtest_p: Some(idx(8)),
                    pr_adjusted: idx(9),
                    source_desc: idx(10),
                    target_desc: idx(11),
                },
                reformat: true,
                output: OutputLocation::BesideInput,
            },
            Layout::Basic => ConvertConfig {
                columns: ColumnMap {
                    source: idx(0),
                    target: idx(1),
                    coef: idx(2),
                    exp_coef: idx(3),
                    se_coef: idx(4),
                    z: idx(5),
                    pr: idx(6),
                    n: idx(7),
                    hrtest_p: None,
                    pr_adjusted: idx(8),
                    source_desc: idx(9),
                    target_desc: idx(10),
                },
                reformat: false,
                output: OutputLocation::WorkingDir,
            },
        }
    }
}

/// A column given either by position or by header name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl ColumnRef {
    fn resolve(&self, headers: &StringRecord) -> Result<usize> {
        match self {
            ColumnRef::Index(i) => Ok(*i),
            ColumnRef::Name(name) => headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ConvertError::UnknownColumn(name.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub source: ColumnRef,
    pub target: ColumnRef,
    pub source_desc: ColumnRef,
    pub target_desc: ColumnRef,
    pub coef: ColumnRef,
    pub exp_coef: ColumnRef,
    pub se_coef: ColumnRef,
    pub z: ColumnRef,
    pub pr: ColumnRef,
    pub n: ColumnRef,
    pub pr_adjusted: ColumnRef,
    pub hrtest_p: Option<ColumnRef>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Layout::Hazard.config().columns
    }
}

impl ColumnMap {
    /// Turns every reference into a position within `headers`.
    pub fn resolve(&self, headers: &StringRecord) -> Result<ResolvedColumns> {
        Ok(ResolvedColumns {
            source: self.source.resolve(headers)?,
            target: self.target.resolve(headers)?,
            source_desc: self.source_desc.resolve(headers)?,
            target_desc: self.target_desc.resolve(headers)?,
            coef: self.coef.resolve(headers)?,
            exp_coef: self.exp_coef.resolve(headers)?,
            se_coef: self.se_coef.resolve(headers)?,
            z: self.z.resolve(headers)?,
            pr: self.pr.resolve(headers)?,
            n: self.n.resolve(headers)?,
            pr_adjusted: self.pr_adjusted.resolve(headers)?,
            hrtest_p: self
                .hrtest_p
                .as_ref()
                .map(|c| c.resolve(headers))
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub source: usize,
    pub target: usize,
    pub source_desc: usize,
    pub target_desc: usize,
    pub coef: usize,
    pub exp_coef: usize,
    pub se_coef: usize,
    pub z: usize,
    pub pr: usize,
    pub n: usize,
    pub pr_adjusted: usize,
    pub hrtest_p: Option<usize>,
}

impl ResolvedColumns {
    /// Number of fields a row needs for every column to be present.
    pub fn min_width(&self) -> usize {
        [
            self.source,
            self.target,
            self.source_desc,
            self.target_desc,
            self.coef,
            self.exp_coef,
            self.se_coef,
            self.z,
            self.pr,
            self.n,
            self.pr_adjusted,
        ]
        .into_iter()
        .chain(self.hrtest_p)
        .max()
        .map_or(0, |max| max + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLocation {
    /// `all.edges.csv.js` in the input file's directory
    BesideInput,
    /// `all.edges.csv.js` relative to the current directory
    WorkingDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub columns: ColumnMap,
    /// Rewrite `exp_coef`/`Pr` to 4 and `HRtest_p`/`Pr_adjusted` to 5 decimals
    pub reformat: bool,
    pub output: OutputLocation,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Layout::Hazard.config()
    }
}

impl ConvertConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn output_path(&self, input: &Path) -> Result<PathBuf> {
        match self.output {
            OutputLocation::BesideInput => {
                let input = if input.is_absolute() {
                    input.to_path_buf()
                } else {
                    std::env::current_dir()?.join(input)
                };
                let dir = input.parent().unwrap_or(Path::new("/"));
                Ok(dir.join(OUTPUT_FILE_NAME))
            }
            OutputLocation::WorkingDir => Ok(PathBuf::from(OUTPUT_FILE_NAME)),
        }
    }
}
