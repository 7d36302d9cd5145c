//! Integration code generation.
//!
//! The mapping graph is turned into an [`IntegrationPlan`] once, then rendered
//! by a per-language [`Dialect`]. Every dialect produces the same program:
//! configuration blocks, a helper that walks dot paths, every fetch before any
//! send, one transfer per bucket, and a top-level wrapper that reports failures
//! instead of crashing.

pub mod go;
pub mod php;
pub mod plan;
pub mod python;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{IntegratorError, IntegratorResult};
use crate::graph::MappingGraph;
use crate::registry::SourceRegistry;

pub use plan::{Assignment, EndpointConfig, FetchStep, IntegrationPlan, SourceConfig, TransferStep};

/// Target languages for generated integration code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Php,
    Go,
}

impl Language {
    pub fn all() -> [Language; 3] {
        [Language::Python, Language::Php, Language::Go]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Php => "php",
            Language::Go => "go",
        }
    }

    /// File name used when writing generated code to disk.
    pub fn filename(&self) -> &'static str {
        match self {
            Language::Python => "integration.py",
            Language::Php => "integration.php",
            Language::Go => "integration.go",
        }
    }

    fn dialect(&self) -> Box<dyn Dialect> {
        match self {
            Language::Python => Box::new(python::Python),
            Language::Php => Box::new(php::Php),
            Language::Go => Box::new(go::Go),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = IntegratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "php" => Ok(Language::Php),
            "go" | "golang" => Ok(Language::Go),
            other => Err(IntegratorError::Validation(format!(
                "Unsupported language: {other} (expected python, php or go)"
            ))),
        }
    }
}

/// Per-language rendering hooks, called in program order by [`render`].
///
/// Each hook appends to `out`. Dialects own literal quoting, variable syntax
/// and the error-handling idiom; the plan owns what happens and in which order.
pub trait Dialect {
    /// File header, imports.
    fn prologue(&self, out: &mut String);
    /// Variables for one configured source.
    fn config_block(&self, out: &mut String, config: &SourceConfig);
    /// Shared helpers (nested lookup, HTTP request).
    fn helpers(&self, out: &mut String);
    /// Opening of the integration routine.
    fn begin_run(&self, out: &mut String, plan: &IntegrationPlan);
    /// Fetch one source; failure must abort the routine.
    fn fetch(&self, out: &mut String, step: &FetchStep);
    /// Build the record for one bucket.
    fn begin_transfer(&self, out: &mut String, step: &TransferStep);
    fn assign(&self, out: &mut String, step: &TransferStep, assignment: &Assignment);
    /// Send the record; failure is reported and the routine continues.
    fn send(&self, out: &mut String, step: &TransferStep);
    /// Report that the target has nowhere to send to.
    fn unsendable(&self, out: &mut String, step: &TransferStep);
    fn end_transfer(&self, out: &mut String, step: &TransferStep);
    /// Close the routine and emit the guarded entry point.
    fn end_run(&self, out: &mut String);
}

/// Drive a dialect over a plan.
pub fn render(plan: &IntegrationPlan, dialect: &dyn Dialect) -> String {
    let mut out = String::new();
    dialect.prologue(&mut out);
    for config in &plan.configs {
        dialect.config_block(&mut out, config);
    }
    dialect.helpers(&mut out);
    dialect.begin_run(&mut out, plan);
    for step in &plan.fetches {
        dialect.fetch(&mut out, step);
    }
    for step in &plan.transfers {
        dialect.begin_transfer(&mut out, step);
        for assignment in &step.assignments {
            dialect.assign(&mut out, step, assignment);
        }
        if step.target_has_update {
            dialect.send(&mut out, step);
        } else {
            dialect.unsendable(&mut out, step);
        }
        dialect.end_transfer(&mut out, step);
    }
    dialect.end_run(&mut out);
    out
}

/// Generate integration code for one language.
///
/// Fails with a validation error unless there are at least two sources and
/// one mapping bucket.
pub fn generate(
    registry: &SourceRegistry,
    graph: &MappingGraph,
    language: Language,
) -> IntegratorResult<String> {
    ensure_generatable(registry, graph)?;
    let plan = IntegrationPlan::build(registry, graph);
    tracing::debug!(
        "Generating {language}: {} configs, {} fetches, {} transfers",
        plan.configs.len(),
        plan.fetches.len(),
        plan.transfers.len()
    );
    Ok(render(&plan, language.dialect().as_ref()))
}

/// Flatten a source name onto a single comment line.
pub(crate) fn comment_text(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_control() || matches!(c, '\u{2028}' | '\u{2029}') { ' ' } else { c })
        .collect()
}

pub(crate) fn ensure_generatable(registry: &SourceRegistry, graph: &MappingGraph) -> IntegratorResult<()> {
    if registry.len() < 2 {
        return Err(IntegratorError::Validation(
            "At least 2 sources are required".to_string(),
        ));
    }
    if graph.is_empty() {
        return Err(IntegratorError::Validation(
            "At least one mapping is required".to_string(),
        ));
    }
    Ok(())
}

/// A generated program.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedFile {
    pub language: Language,
    pub filename: String,
    pub size: usize,
    pub content: String,
}

impl GeneratedFile {
    fn new(language: Language, content: String) -> Self {
        Self {
            language,
            filename: language.filename().to_string(),
            size: content.len(),
            content,
        }
    }
}

/// Generate every language as in-memory strings (no disk write).
pub fn generate_all_in_memory(
    registry: &SourceRegistry,
    graph: &MappingGraph,
) -> IntegratorResult<Vec<GeneratedFile>> {
    Language::all()
        .into_iter()
        .map(|lang| generate(registry, graph, lang).map(|code| GeneratedFile::new(lang, code)))
        .collect()
}

/// Generate every language and write the files into `output_dir`.
pub fn write_all(
    registry: &SourceRegistry,
    graph: &MappingGraph,
    output_dir: &Path,
) -> IntegratorResult<Vec<GeneratedFile>> {
    let files = generate_all_in_memory(registry, graph)?;
    std::fs::create_dir_all(output_dir)?;
    for file in &files {
        std::fs::write(output_dir.join(&file.filename), &file.content)?;
    }
    tracing::info!("Wrote {} integration files to {}", files.len(), output_dir.display());
    Ok(files)
}
