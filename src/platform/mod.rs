//! The platform facade: one entry point holding the validator, the
//! compiler, the scheduler, a compiled-graph cache, and an execution
//! history. All mutation goes through `&mut self`, which is the
//! single-writer discipline protecting the caches.

mod analysis;
mod export;

pub use analysis::{AnalysisResult, ComplexityBucket};
pub use export::ExportFormat;

use crate::compiler::{CompiledGraph, Compiler, OptimizationMode};
use crate::engine::{CustomRegistry, ExecutionResult, InputMap, Scheduler};
use crate::error::PlatformError;
use crate::model::{ConfigOverrides, Document};
use crate::validator::{ValidationResult, Validator};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// What loading a document produced: the validation envelope, and the
/// document id under which the compiled graph was cached when validation
/// passed.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub document_id: String,
    pub validation: ValidationResult,
    pub loaded: bool,
}

/// Aggregate counters over the loaded graphs and execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub loaded_forms: usize,
    pub total_executions: usize,
    pub successful_executions: usize,
    pub failed_executions: usize,
    pub avg_execution_ms: f64,
}

/// The facade over the whole pipeline.
pub struct Platform {
    validator: Validator,
    compiler: Compiler,
    scheduler: Scheduler,
    graphs: AHashMap<String, CompiledGraph>,
    history: BTreeMap<String, ExecutionResult>,
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform {
    pub fn new() -> Self {
        Self {
            validator: Validator::new(),
            compiler: Compiler::new(),
            scheduler: Scheduler::new(),
            graphs: AHashMap::new(),
            history: BTreeMap::new(),
        }
    }

    /// Builds a platform whose scheduler dispatches custom node types
    /// through the given table.
    pub fn with_custom_evaluators(custom: CustomRegistry) -> Self {
        Self {
            scheduler: Scheduler::with_custom_evaluators(custom),
            ..Self::new()
        }
    }

    /// Loads a document from disk: validates, compiles, and caches it
    /// under its metadata id. A document that fails validation is not an
    /// `Err`; the outcome carries the envelope with `loaded = false`.
    pub fn load_document(&mut self, path: impl AsRef<Path>) -> Result<LoadOutcome, PlatformError> {
        let document = Document::from_file(path.as_ref())?;
        let validation = self.validator.validate(&document);
        if !validation.valid {
            return Ok(LoadOutcome {
                document_id: document.metadata.id,
                validation,
                loaded: false,
            });
        }
        let graph = self.compiler.compile(&document)?;
        let document_id = document.metadata.id.clone();
        log::info!("loaded '{}' from {}", document_id, path.as_ref().display());
        self.graphs.insert(document_id.clone(), graph);
        Ok(LoadOutcome {
            document_id,
            validation,
            loaded: true,
        })
    }

    /// Validates a document object directly.
    pub fn validate_document(&self, document: &Document) -> ValidationResult {
        self.validator.validate(document)
    }

    /// Validates a file on disk; parse failures become schema issues.
    pub fn validate_file(&self, path: impl AsRef<Path>) -> ValidationResult {
        self.validator.validate_file(path)
    }

    /// Validates every path in turn, pairing each with its envelope.
    pub fn batch_validate(
        &self,
        paths: &[impl AsRef<Path>],
    ) -> Vec<(String, ValidationResult)> {
        paths
            .iter()
            .map(|path| {
                let name = path.as_ref().display().to_string();
                (name, self.validator.validate_file(path))
            })
            .collect()
    }

    /// Compiles a document, optionally optimizing it, and caches the
    /// result under the document id.
    pub fn compile_document(
        &mut self,
        document: &Document,
        mode: Option<OptimizationMode>,
    ) -> Result<&CompiledGraph, PlatformError> {
        let validation = self.validator.validate(document);
        if !validation.valid {
            return Err(PlatformError::InvalidDocument {
                id: document.metadata.id.clone(),
                error_count: validation.errors.len(),
            });
        }
        let mut graph = self.compiler.compile(document)?;
        if let Some(mode) = mode {
            graph = self.compiler.optimize(graph, mode);
        }
        let id = document.metadata.id.clone();
        self.graphs.insert(id.clone(), graph);
        Ok(&self.graphs[&id])
    }

    /// Fetches a cached graph.
    pub fn graph(&self, id: &str) -> Option<&CompiledGraph> {
        self.graphs.get(id)
    }

    /// Lists the cached document ids, sorted for stable output.
    pub fn list_graphs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.graphs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Evicts a cached graph; returns whether one was present.
    pub fn unload(&mut self, id: &str) -> bool {
        self.graphs.remove(id).is_some()
    }

    /// Serializes a cached graph to pretty JSON at `path`. Id-keyed maps
    /// are written as objects.
    pub fn save_graph(&self, id: &str, path: impl AsRef<Path>) -> Result<(), PlatformError> {
        let graph = self
            .graphs
            .get(id)
            .ok_or_else(|| PlatformError::UnknownGraph(id.to_string()))?;
        let json = serde_json::to_string_pretty(&graph.to_json())?;
        fs::write(path.as_ref(), json).map_err(|source| PlatformError::Write {
            path: path.as_ref().display().to_string(),
            source,
        })
    }

    /// Creates a fresh template document.
    pub fn create_template(&self, id: &str, name: &str, author: Option<&str>) -> Document {
        Document::template(id, name, author)
    }

    /// Analyzes a document: complexity bucket, type distributions,
    /// issues, recommendations.
    pub fn analyze(&self, document: &Document) -> AnalysisResult {
        let validation = self.validator.validate(document);
        let metrics = if validation.valid {
            self.compiler
                .compile(document)
                .map(|graph| *graph.complexity())
                .unwrap_or_default()
        } else {
            Default::default()
        };
        analysis::analyze(document, &validation, metrics)
    }

    /// Renders a human-readable report combining validation status and
    /// analysis.
    pub fn report(&self, document: &Document) -> String {
        let validation = self.validator.validate(document);
        let analysis = self.analyze(document);
        analysis::render_report(document, &validation, &analysis)
    }

    /// Executes a loaded document and records the result in history.
    pub fn execute(
        &mut self,
        id: &str,
        inputs: &InputMap,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ExecutionResult, PlatformError> {
        let graph = self
            .graphs
            .get(id)
            .ok_or_else(|| PlatformError::UnknownGraph(id.to_string()))?;
        let result = self.scheduler.execute(graph, inputs, overrides);
        self.history.insert(result.history_key(), result.clone());
        Ok(result)
    }

    /// Loads a document from disk and executes it in one step.
    pub fn execute_file(
        &mut self,
        path: impl AsRef<Path>,
        inputs: &InputMap,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ExecutionResult, PlatformError> {
        let outcome = self.load_document(path)?;
        if !outcome.loaded {
            return Err(PlatformError::InvalidDocument {
                id: outcome.document_id,
                error_count: outcome.validation.errors.len(),
            });
        }
        self.execute(&outcome.document_id, inputs, overrides)
    }

    /// Executes against a deep copy of the cached graph, leaving both the
    /// cache and the history untouched.
    pub fn simulate(
        &self,
        id: &str,
        inputs: &InputMap,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ExecutionResult, PlatformError> {
        let graph = self
            .graphs
            .get(id)
            .ok_or_else(|| PlatformError::UnknownGraph(id.to_string()))?
            .clone();
        Ok(self.scheduler.execute(&graph, inputs, overrides))
    }

    /// Runs a batch of executions, one result per request.
    pub fn batch_execute(
        &mut self,
        requests: &[(String, InputMap)],
    ) -> Vec<Result<ExecutionResult, PlatformError>> {
        requests
            .iter()
            .map(|(id, inputs)| self.execute(id, inputs, None))
            .collect()
    }

    /// Enumerates the recorded executions of one document, oldest first.
    pub fn execution_history(&self, id: &str) -> Vec<&ExecutionResult> {
        let prefix = format!("{}_", id);
        self.history
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, result)| result)
            .collect()
    }

    /// Clears history for one document, or everything when `id` is
    /// `None`. Returns the number of entries removed.
    pub fn clear_history(&mut self, id: Option<&str>) -> usize {
        match id {
            Some(id) => {
                let prefix = format!("{}_", id);
                let keys: Vec<String> = self
                    .history
                    .keys()
                    .filter(|key| key.starts_with(&prefix))
                    .cloned()
                    .collect();
                for key in &keys {
                    self.history.remove(key);
                }
                keys.len()
            }
            None => {
                let count = self.history.len();
                self.history.clear();
                count
            }
        }
    }

    /// Exports a document's execution history in the requested format.
    pub fn export_history(
        &self,
        id: &str,
        format: ExportFormat,
    ) -> Result<String, PlatformError> {
        if !self.graphs.contains_key(id) && self.execution_history(id).is_empty() {
            return Err(PlatformError::UnknownGraph(id.to_string()));
        }
        let results = self.execution_history(id);
        Ok(export::export(id, &results, format))
    }

    /// Aggregate counters for status surfaces.
    pub fn stats(&self) -> PlatformStats {
        let total = self.history.len();
        let successful = self.history.values().filter(|r| r.success).count();
        let avg = if total == 0 {
            0.0
        } else {
            self.history
                .values()
                .map(|r| r.metrics.elapsed_ms)
                .sum::<u64>() as f64
                / total as f64
        };
        PlatformStats {
            loaded_forms: self.graphs.len(),
            total_executions: total,
            successful_executions: successful,
            failed_executions: total - successful,
            avg_execution_ms: avg,
        }
    }
}
