use clap::{Parser, Subcommand, ValueEnum};
use cogniform::compiler::{Compiler, OptimizationMode};
use cogniform::model::Document;
use cogniform::validator::{ValidationResult, Validator};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Validate, compile, and inspect cognitive model documents.
#[derive(Parser, Debug)]
#[command(name = "cogniform", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate one or more .form documents
    Validate {
        /// Paths to the documents to validate
        files: Vec<PathBuf>,
        /// Print every issue, not just a per-file verdict
        #[arg(short, long)]
        verbose: bool,
        /// Also print warnings
        #[arg(short = 'w', long)]
        warnings: bool,
        /// Emit the raw validation envelopes as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compile a document to an execution-ready graph
    Compile {
        file: PathBuf,
        /// Write the compiled graph as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Apply an optimization mode after compilation
        #[arg(long, value_enum)]
        optimize: Option<OptimizeCli>,
        /// Print complexity statistics
        #[arg(long)]
        stats: bool,
    },
    /// Show metadata and structure of a document
    Info {
        file: PathBuf,
        /// Print the forward adjacency of the compiled graph
        #[arg(long)]
        graph: bool,
        /// Print cross-document dependencies
        #[arg(long)]
        dependencies: bool,
    },
    /// Write sample documents to a directory
    Examples {
        #[arg(long, default_value = "form-examples")]
        path: PathBuf,
    },
}

/// CLI-facing spelling of the optimization modes.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OptimizeCli {
    Speed,
    Memory,
    Balanced,
}

impl From<OptimizeCli> for OptimizationMode {
    fn from(mode: OptimizeCli) -> Self {
        match mode {
            OptimizeCli::Speed => OptimizationMode::Speed,
            OptimizeCli::Memory => OptimizationMode::Memory,
            OptimizeCli::Balanced => OptimizationMode::Balanced,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let ok = match cli.command {
        Command::Validate {
            files,
            verbose,
            warnings,
            json,
        } => run_validate(&files, verbose, warnings, json),
        Command::Compile {
            file,
            output,
            optimize,
            stats,
        } => run_compile(&file, output.as_deref(), optimize, stats),
        Command::Info {
            file,
            graph,
            dependencies,
        } => run_info(&file, graph, dependencies),
        Command::Examples { path } => run_examples(&path),
    };
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn fail(message: &str) -> bool {
    eprintln!("\u{2717} {}", message);
    false
}

fn run_validate(files: &[PathBuf], verbose: bool, show_warnings: bool, json: bool) -> bool {
    if files.is_empty() {
        return fail("no files given");
    }

    let validator = Validator::new();
    let mut all_valid = true;
    let mut envelopes: Vec<(String, ValidationResult)> = Vec::new();

    for file in files {
        let result = validator.validate_file(file);
        all_valid &= result.valid;

        if json {
            envelopes.push((file.display().to_string(), result));
            continue;
        }

        if result.valid {
            println!(
                "\u{2713} {} ({} nodes, {} relations)",
                file.display(),
                result.summary.node_count,
                result.summary.relation_count
            );
        } else {
            eprintln!(
                "\u{2717} {} ({} error(s))",
                file.display(),
                result.errors.len()
            );
        }
        if verbose || !result.valid {
            for issue in &result.errors {
                eprintln!("    error[{}]: {}", issue_kind(issue.kind), issue.message);
            }
        }
        if show_warnings || verbose {
            for issue in &result.warnings {
                println!("    warning: {}", issue.message);
            }
        }
    }

    if json {
        match serde_json::to_string_pretty(&envelopes) {
            Ok(text) => println!("{}", text),
            Err(e) => return fail(&format!("failed to serialize results: {}", e)),
        }
    }
    all_valid
}

fn issue_kind(kind: cogniform::validator::IssueKind) -> &'static str {
    use cogniform::validator::IssueKind;
    match kind {
        IssueKind::Schema => "schema",
        IssueKind::Reference => "reference",
        IssueKind::Cycle => "cycle",
        IssueKind::Logic => "logic",
    }
}

fn run_compile(
    file: &PathBuf,
    output: Option<&std::path::Path>,
    optimize: Option<OptimizeCli>,
    stats: bool,
) -> bool {
    let document = match Document::from_file(file) {
        Ok(document) => document,
        Err(e) => return fail(&e.to_string()),
    };
    let validation = Validator::new().validate(&document);
    if !validation.valid {
        for issue in &validation.errors {
            eprintln!("    error: {}", issue.message);
        }
        return fail(&format!("'{}' failed validation", document.metadata.id));
    }

    let compiler = Compiler::new();
    let mut graph = match compiler.compile(&document) {
        Ok(graph) => graph,
        Err(e) => return fail(&format!("compilation failed: {}", e)),
    };
    if let Some(mode) = optimize {
        graph = compiler.optimize(graph, mode.into());
        println!("Applied {:?} optimization", mode);
    }

    println!(
        "Compiled '{}': {} nodes, {} relations, {} entry point(s), {} exit point(s)",
        graph.metadata.id,
        graph.node_count(),
        graph.relation_count(),
        graph.entry_points.len(),
        graph.exit_points.len()
    );

    if stats {
        let complexity = graph.complexity();
        println!("  max depth:         {}", complexity.max_depth);
        println!("  average branching: {:.2}", complexity.avg_branching);
        println!("  cycle count:       {}", complexity.cycle_count);
    }

    if let Some(path) = output {
        let json = match serde_json::to_string_pretty(&graph.to_json()) {
            Ok(json) => json,
            Err(e) => return fail(&format!("failed to serialize graph: {}", e)),
        };
        if let Err(e) = fs::write(path, json) {
            return fail(&format!("failed to write '{}': {}", path.display(), e));
        }
        println!("Wrote compiled graph to '{}'", path.display());
    }
    true
}

fn run_info(file: &PathBuf, show_graph: bool, show_dependencies: bool) -> bool {
    let document = match Document::from_file(file) {
        Ok(document) => document,
        Err(e) => return fail(&e.to_string()),
    };

    let meta = &document.metadata;
    println!("{} ({})", meta.name, meta.id);
    println!("  version:   {}", meta.version);
    if let Some(author) = &meta.author {
        println!("  author:    {}", author);
    }
    if let Some(description) = &meta.description {
        println!("  about:     {}", description);
    }
    println!("  nodes:     {}", document.nodes.len());
    println!("  relations: {}", document.relations.len());
    if !meta.tags.is_empty() {
        println!("  tags:      {}", meta.tags.join(", "));
    }

    if show_dependencies {
        if meta.dependencies.is_empty() {
            println!("  no cross-document dependencies");
        } else {
            println!("  dependencies:");
            for dependency in &meta.dependencies {
                println!("    {} @ {}", dependency.id, dependency.version);
            }
        }
    }

    if show_graph {
        let validation = Validator::new().validate(&document);
        if !validation.valid {
            return fail("document failed validation; cannot compile the graph view");
        }
        match Compiler::new().compile(&document) {
            Ok(graph) => {
                println!("  graph:");
                for (idx, node) in graph.nodes().iter().enumerate() {
                    let targets: Vec<&str> = graph
                        .successors(idx)
                        .iter()
                        .map(|edge| graph.node_at(edge.node).id.as_str())
                        .collect();
                    if targets.is_empty() {
                        println!("    {} -> (exit)", node.id);
                    } else {
                        println!("    {} -> {}", node.id, targets.join(", "));
                    }
                }
            }
            Err(e) => return fail(&format!("compilation failed: {}", e)),
        }
    }
    true
}

fn run_examples(path: &PathBuf) -> bool {
    if let Err(e) = fs::create_dir_all(path) {
        return fail(&format!(
            "failed to create directory '{}': {}",
            path.display(),
            e
        ));
    }
    for (name, content) in [
        ("weather-decision.form", WEATHER_DECISION),
        ("resource-allocation.form", RESOURCE_ALLOCATION),
    ] {
        let target = path.join(name);
        if let Err(e) = fs::write(&target, content) {
            return fail(&format!("failed to write '{}': {}", target.display(), e));
        }
        println!("Wrote {}", target.display());
    }
    true
}

const WEATHER_DECISION: &str = r#"{
  "metadata": {
    "id": "weather-decision",
    "name": "Weather Decision",
    "description": "Routes to an outdoor or indoor activity from a weather reading.",
    "version": "1.0.0",
    "created_at": "2024-05-01T09:00:00Z",
    "updated_at": "2024-05-01T09:00:00Z",
    "author": "cogniform"
  },
  "nodes": [
    { "id": "weather_input", "type": "event", "label": "Weather input", "data": { "value": null } },
    {
      "id": "good_weather_condition",
      "type": "condition",
      "label": "Good weather",
      "data": {
        "parameters": {
          "temperature_min": 15,
          "temperature_max": 30,
          "precipitation_max": 0.1,
          "wind_speed_max": 25
        }
      }
    },
    { "id": "outdoor_activity", "type": "action", "label": "Outdoor activity" },
    { "id": "indoor_activity", "type": "action", "label": "Indoor activity" }
  ],
  "relations": [
    {
      "id": "weather-triggers-check",
      "type": "triggers",
      "source": "weather_input",
      "target": "good_weather_condition"
    },
    {
      "id": "good-weather-outdoor",
      "type": "causes",
      "source": "good_weather_condition",
      "target": "outdoor_activity",
      "conditions": [{ "field": "data.value", "operator": "eq", "value": true }]
    },
    {
      "id": "bad-weather-indoor",
      "type": "causes",
      "source": "good_weather_condition",
      "target": "indoor_activity",
      "conditions": [{ "field": "data.value", "operator": "eq", "value": false }]
    }
  ],
  "execution": { "mode": "sequential", "max_iterations": 50, "timeout_ms": 5000 }
}
"#;

const RESOURCE_ALLOCATION: &str = r#"{
  "metadata": {
    "id": "resource-allocation",
    "name": "Multi-path resource allocation",
    "description": "Scores resource constraints and picks an allocation path.",
    "version": "1.0.0",
    "created_at": "2024-05-01T09:00:00Z",
    "updated_at": "2024-05-01T09:00:00Z",
    "author": "cogniform"
  },
  "nodes": [
    { "id": "cpu_satisfaction", "type": "concept", "label": "CPU satisfaction" },
    { "id": "memory_satisfaction", "type": "concept", "label": "Memory satisfaction" },
    { "id": "budget_satisfaction", "type": "concept", "label": "Budget satisfaction" },
    {
      "id": "constraint_optimizer",
      "type": "formula",
      "label": "Constraint optimizer",
      "data": {
        "parameters": {
          "expression": "cpu_satisfaction*0.4 + memory_satisfaction*0.3 + budget_satisfaction*0.3"
        }
      }
    },
    { "id": "optimal_allocation", "type": "action", "label": "Optimal allocation" },
    { "id": "degraded_allocation", "type": "action", "label": "Degraded allocation" }
  ],
  "relations": [
    {
      "id": "cpu-influences-optimizer",
      "type": "influences",
      "source": "cpu_satisfaction",
      "target": "constraint_optimizer"
    },
    {
      "id": "memory-influences-optimizer",
      "type": "influences",
      "source": "memory_satisfaction",
      "target": "constraint_optimizer"
    },
    {
      "id": "budget-influences-optimizer",
      "type": "influences",
      "source": "budget_satisfaction",
      "target": "constraint_optimizer"
    },
    {
      "id": "optimizer-causes-optimal",
      "type": "causes",
      "source": "constraint_optimizer",
      "target": "optimal_allocation",
      "conditions": [{ "field": "data.value", "operator": "gte", "value": 0.9 }]
    },
    {
      "id": "optimizer-causes-degraded",
      "type": "causes",
      "source": "constraint_optimizer",
      "target": "degraded_allocation",
      "conditions": [
        { "field": "data.value", "operator": "lt", "value": 0.9 },
        { "field": "data.value", "operator": "gte", "value": 0.4 }
      ]
    }
  ],
  "execution": { "mode": "sequential", "max_iterations": 50, "timeout_ms": 5000 }
}
"#;
