//! `jsonkit` CLI: format, merge, query, and inspect JSON from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Re-render JSON compactly (stdin → stdout)
//! echo '{ "name" : "Alice" }' | jsonkit format
//!
//! # Pretty-print from file to file
//! jsonkit format --pretty -i data.json -o pretty.json
//!
//! # Merge two objects (later keys win) or concatenate two arrays
//! jsonkit merge base.json overrides.json
//!
//! # Read a nested value by dot path (array indices are numbers)
//! jsonkit get users.0.name -i data.json
//!
//! # Node counts and depth
//! jsonkit stats -i data.json
//!
//! # Tighter parser limits, from flags or a JSON file
//! jsonkit --max-depth 16 format -i untrusted.json
//! jsonkit --limits limits.json format -i untrusted.json
//! ```
//!
//! Set `RUST_LOG=debug` to see engine diagnostics on stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jsonkit_core::{Document, Handle, Kind, Limits};
use std::collections::BTreeMap;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonkit", version, about = "Handle-based JSON toolkit CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with parser/store limits (max_depth, max_input_bytes, max_nodes)
    #[arg(long, global = true)]
    limits: Option<String>,

    /// Maximum nesting depth accepted by the parser
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Maximum number of live nodes in the store
    #[arg(long, global = true)]
    max_nodes: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse JSON and render it again (compact unless --pretty)
    Format {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Indent nested values
        #[arg(long)]
        pretty: bool,
        /// Spaces per indentation level with --pretty
        #[arg(long, default_value_t = 2)]
        indent: usize,
    },
    /// Merge two objects or concatenate two arrays
    Merge {
        /// First document
        first: String,
        /// Second document; its keys win on collision
        second: String,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Indent nested values
        #[arg(long)]
        pretty: bool,
    },
    /// Print the value at a dot-separated path such as `users.0.name`
    Get {
        /// Path of object keys and array indices
        path: String,
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Print strings without JSON quoting
        #[arg(long)]
        raw: bool,
    },
    /// Show node counts per kind, nesting depth, and compact size
    Stats {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let limits = build_limits(cli.limits.as_deref(), cli.max_depth, cli.max_nodes)?;
    let mut doc = Document::with_limits(limits);

    match cli.command {
        Commands::Format {
            input,
            output,
            pretty,
            indent,
        } => {
            let text = read_input(input.as_deref())?;
            let root = doc.parse(&text).context("Failed to parse JSON input")?;
            let rendered = render(&doc, root, pretty.then_some(indent))?;
            write_output(output.as_deref(), &rendered)?;
            doc.cleanup(root, true)?;
        }
        Commands::Merge {
            first,
            second,
            output,
            pretty,
        } => {
            let a = parse_file(&mut doc, &first)?;
            let b = parse_file(&mut doc, &second)?;
            let merged = doc
                .append(a, b)
                .with_context(|| format!("Failed to merge {first} with {second}"))?;
            let rendered = render(&doc, merged, pretty.then_some(2))?;
            write_output(output.as_deref(), &rendered)?;
            doc.cleanup(merged, true)?;
        }
        Commands::Get { path, input, raw } => {
            let text = read_input(input.as_deref())?;
            let root = doc.parse(&text).context("Failed to parse JSON input")?;
            let target = select_path(&mut doc, root, &path)?;
            let rendered = match (raw, doc.node_type(target)?) {
                (true, Kind::String) => doc.get_node_string(target)?,
                _ => doc.to_json_string(target)?,
            };
            println!("{}", rendered);
            doc.cleanup(target, true)?;
            doc.cleanup(root, true)?;
        }
        Commands::Stats { input } => {
            let text = read_input(input.as_deref())?;
            let root = doc.parse(&text).context("Failed to parse JSON input")?;
            let stats = collect_stats(&doc, root)?;
            let compact = doc.to_json_string(root)?.len();
            println!("Input size:    {} bytes", text.len());
            println!("Compact size:  {} bytes", compact);
            println!("Nodes:         {}", stats.total);
            println!("Max depth:     {}", stats.max_depth);
            for (kind, count) in &stats.by_kind {
                println!("  {:<12} {}", format!("{kind}:"), count);
            }
            doc.cleanup(root, true)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so they never mix with JSON on stdout.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Start from the defaults (or a limits file) and apply flag overrides.
fn build_limits(
    path: Option<&str>,
    max_depth: Option<usize>,
    max_nodes: Option<usize>,
) -> Result<Limits> {
    let mut limits = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read limits file: {}", path))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Invalid limits file: {}", path))?
        }
        None => Limits::default(),
    };
    if let Some(depth) = max_depth {
        limits.max_depth = depth;
    }
    if let Some(nodes) = max_nodes {
        limits.max_nodes = nodes;
    }
    tracing::debug!(?limits, "effective limits");
    Ok(limits)
}

fn render(doc: &Document, node: Handle, indent: Option<usize>) -> Result<String> {
    let text = match indent {
        Some(indent) => doc.to_json_pretty(node, indent)?,
        None => doc.to_json_string(node)?,
    };
    Ok(text)
}

/// Walk `path` from `root`, returning a new reference to the selected node.
/// Segments are object keys, or indices when the current node is an array.
fn select_path(doc: &mut Document, root: Handle, path: &str) -> Result<Handle> {
    let mut current = doc.retain(root)?;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let next = match doc.node_type(current)? {
            Kind::Array => {
                let index: i64 = segment
                    .parse()
                    .with_context(|| format!("Expected array index, got '{}'", segment))?;
                doc.array_element(current, index)
            }
            _ => doc.get_object(current, segment),
        }
        .with_context(|| format!("Path '{}' failed at segment '{}'", path, segment))?;
        doc.cleanup(current, true)?;
        current = next;
    }
    Ok(current)
}

struct Stats {
    total: usize,
    max_depth: usize,
    by_kind: BTreeMap<String, usize>,
}

fn collect_stats(doc: &Document, root: Handle) -> Result<Stats> {
    let mut stats = Stats {
        total: 0,
        max_depth: 0,
        by_kind: BTreeMap::new(),
    };
    let mut pending = vec![(root, 0usize)];
    while let Some((handle, depth)) = pending.pop() {
        let data = doc.store().resolve(handle)?;
        stats.total += 1;
        stats.max_depth = stats.max_depth.max(depth);
        *stats.by_kind.entry(data.kind().to_string()).or_insert(0) += 1;
        pending.extend(data.children().into_iter().map(|child| (child, depth + 1)));
    }
    Ok(stats)
}

fn parse_file(doc: &mut Document, path: &str) -> Result<Handle> {
    let text = read_input(Some(path))?;
    doc.parse(&text)
        .with_context(|| format!("Failed to parse JSON file: {}", path))
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, format!("{}\n", content))
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
