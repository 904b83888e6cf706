use std::path::PathBuf;

/// Inputs of a `transform` run.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub mapping: PathBuf,
    pub standard_mappings: Option<PathBuf>,
    pub tablename: Option<String>,
    pub input: PathBuf,
}

/// Outcome of a `transform` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSummary {
    pub table: String,
    pub layout: &'static str,
    pub records: usize,
}

/// One row of the `check` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub layout: &'static str,
    pub klasses: Vec<String>,
    pub columns: usize,
    pub header_lines: usize,
    pub footer_lines: usize,
}
