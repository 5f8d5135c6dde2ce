use std::io::IsTerminal;
use std::io::Read;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use qb::catalog::Catalog;
use qb::editor::{Edit, TreeEditor};
use qb::format::Format;
use qb::output;
use qb::parser;
use qb::schema::Schema;
use qb::tracing_init;
use qb::tree::ids::{IdGenerator, RandomIds, SequentialIds};
use qb::tree::{normalize, Query};

#[derive(Parser)]
#[command(name = "qb", version, about = "Build and edit nested boolean query trees")]
struct Cli {
    /// Query file (reads stdin if omitted and piped; starts empty otherwise)
    #[arg(short, long, global = true)]
    query: Option<PathBuf>,

    /// Catalog file with fields, operators and combinators
    #[arg(short = 'C', long, global = true)]
    catalog: Option<PathBuf>,

    /// Force input format [yaml, json, toml]
    #[arg(short = 'p', long = "input-format", global = true)]
    input_format: Option<String>,

    /// Output format [yaml, json, toml] (default: same as input)
    #[arg(short, long = "output-format", global = true)]
    output_format: Option<String>,

    /// Compact output (no pretty printing)
    #[arg(short, long, global = true)]
    compact: bool,

    /// Raw string output (no quotes for string values)
    #[arg(short, long, global = true)]
    raw: bool,

    /// Rewrite the query file with the edited query
    #[arg(short, long = "in-place", global = true)]
    in_place: bool,

    /// Number new nodes r-1, g-2, ... instead of random ids
    #[arg(long, global = true)]
    sequential_ids: bool,

    /// Log edits to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the normalized query
    Show,
    /// Nesting level of a node (-1 for the root or an unknown id)
    Level { id: String },
    /// Parent id of a node (null for the root)
    Parent { id: String },
    /// Whether an id names a rule or a group
    Kind { id: String },
    /// Operators applicable to a field
    Operators { field: String },
    /// List the field catalog
    Fields,
    /// Append a rule with default field and operator to a group
    AddRule { parent: String },
    /// Append an empty group to a group
    AddGroup { parent: String },
    /// Remove a rule or a group with everything in it
    Remove { id: String },
    /// Change a rule's field, operator or value
    UpdateRule {
        id: String,
        #[arg(long)]
        field: Option<String>,
        #[arg(long)]
        operator: Option<String>,
        /// Parsed as JSON when possible, otherwise taken as a string
        #[arg(long)]
        value: Option<String>,
    },
    /// Change a group's combinator
    Combinator { id: String, combinator: String },
    /// Apply a list of edits read from a file
    Apply { script: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_init::init_tracing(cli.verbose);

    if cli.in_place && cli.query.is_none() {
        anyhow::bail!("--in-place requires --query");
    }

    let catalog = match &cli.catalog {
        Some(path) => {
            let value = read_document(path, None)?;
            Catalog::from_value(&value)
                .with_context(|| format!("loading catalog {}", path.display()))?
        }
        None => Catalog::new(),
    };
    let ids: Arc<dyn IdGenerator> = if cli.sequential_ids {
        Arc::new(SequentialIds::new())
    } else {
        Arc::new(RandomIds)
    };

    let (input, in_fmt) = read_query_input(&cli)?;
    let query = normalize::normalize(&input, &catalog, &*ids).context("normalizing query")?;
    let out_fmt = match &cli.output_format {
        Some(f) => Format::from_str_name(f)?,
        None => in_fmt,
    };

    let editor = TreeEditor::with_ids(Arc::new(catalog), ids);
    let schema = Schema::new(&query, editor.catalog());

    let edits = match &cli.command {
        Command::Show => {
            return emit(&query.to_value()?, out_fmt, &cli);
        }
        Command::Level { id } => {
            return emit(&Value::from(schema.get_level(id)), out_fmt, &cli);
        }
        Command::Parent { id } => {
            let parent = schema.get_parent_id(id)?;
            return emit(&parent.map_or(Value::Null, |p| Value::from(p.as_str())), out_fmt, &cli);
        }
        Command::Kind { id } => {
            let kind = if schema.is_rule_group(id) {
                "group"
            } else if schema.is_rule(id) {
                "rule"
            } else {
                return Err(qb::QbError::NotFound(id.clone()).into());
            };
            return emit(&Value::from(kind), out_fmt, &cli);
        }
        Command::Operators { field } => {
            let operators = serde_json::to_value(schema.get_operators(field)?)?;
            return emit(&operators, out_fmt, &cli);
        }
        Command::Fields => {
            let fields = schema.fields().iter().map(|f| f.to_value()).collect();
            return emit(&Value::Array(fields), out_fmt, &cli);
        }
        Command::AddRule { parent } => vec![Edit::AddRule {
            parent: parent.as_str().into(),
        }],
        Command::AddGroup { parent } => vec![Edit::AddGroup {
            parent: parent.as_str().into(),
        }],
        Command::Remove { id } => vec![Edit::Remove { id: id.as_str().into() }],
        Command::UpdateRule {
            id,
            field,
            operator,
            value,
        } => vec![Edit::UpdateRule {
            id: id.as_str().into(),
            field: field.clone(),
            operator: operator.clone(),
            value: value.as_deref().map(parse_cli_value),
        }],
        Command::Combinator { id, combinator } => vec![Edit::UpdateCombinator {
            id: id.as_str().into(),
            combinator: combinator.clone(),
        }],
        Command::Apply { script } => {
            let value = read_document(script, None)?;
            serde_json::from_value(value)
                .with_context(|| format!("reading edits from {}", script.display()))?
        }
    };

    let edited = apply_edits(&editor, query, &edits)?;
    let value = edited.to_value()?;

    if cli.in_place {
        let formatted = format_output(&value, out_fmt, &cli)?;
        let path = cli.query.as_deref().context("--in-place requires --query")?;
        let parent = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent).context("creating temporary file")?;
        tmp.write_all(formatted.as_bytes())
            .context("writing temporary file")?;
        tmp.persist(path)
            .context("replacing file with updated query")?;
        Ok(())
    } else {
        emit(&value, out_fmt, &cli)
    }
}

fn apply_edits(editor: &TreeEditor, mut query: Query, edits: &[Edit]) -> Result<Query> {
    for (i, edit) in edits.iter().enumerate() {
        let (next, created) = editor
            .apply(&query, edit)
            .with_context(|| format!("edit #{}: {edit:?}", i + 1))?;
        if let Some(id) = created {
            info!(%id, "created node");
        }
        query = next;
    }
    Ok(query)
}

/// Query input plus the format it was read in.
fn read_query_input(cli: &Cli) -> Result<(Value, Format)> {
    let forced = cli.input_format.as_deref().map(Format::from_str_name).transpose()?;
    match &cli.query {
        Some(path) => {
            let fmt = match forced {
                Some(f) => f,
                None => Format::from_extension(path)?,
            };
            Ok((read_document(path, Some(fmt))?, fmt))
        }
        None if !std::io::stdin().is_terminal() => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            let fmt = forced.unwrap_or_else(|| Format::sniff(&buf));
            Ok((parser::parse(&buf, fmt)?, fmt))
        }
        None => Ok((Value::Null, forced.unwrap_or(Format::Json))),
    }
}

fn read_document(path: &Path, format: Option<Format>) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let fmt = match format {
        Some(f) => f,
        None => Format::from_extension(path)?,
    };
    parser::parse(&content, fmt).with_context(|| format!("parsing {}", path.display()))
}

fn parse_cli_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn format_output(value: &Value, out_fmt: Format, cli: &Cli) -> Result<String> {
    let mut formatted = output::pretty::format_value(value, out_fmt, cli.compact, cli.raw)?;
    if !formatted.ends_with('\n') {
        formatted.push('\n');
    }
    Ok(formatted)
}

fn emit(value: &Value, out_fmt: Format, cli: &Cli) -> Result<()> {
    let formatted = format_output(value, out_fmt, cli)?;
    print!("{formatted}");
    Ok(())
}
