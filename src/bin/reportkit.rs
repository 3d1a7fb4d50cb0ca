//! reportkit: build, run, export and save report queries.
//!
//! # Usage
//!
//! ```bash
//! # Browse the schema
//! reportkit tables
//! reportkit tables orders
//!
//! # Builder mode
//! reportkit query --table orders --columns id,total --filter 'total>=100' --sort-by total --desc
//!
//! # Raw SQL
//! reportkit query --sql 'SELECT region, SUM(total) FROM orders GROUP BY region'
//!
//! # Save and rerun
//! reportkit templates save "Big orders" --table orders --columns id,total
//! reportkit templates run "Big orders" --page 2
//! ```

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use reportkit::config::Config;
use reportkit::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reportkit")]
#[command(version)]
#[command(about = "📊 Interactive report queries: build, page, export, save", long_about = None)]
#[command(after_help = "EXAMPLES:
    reportkit query --table orders --columns id,total --filter 'total>=100'
    reportkit query --sql 'SELECT * FROM orders' --page 2 --page-size 25
    reportkit export --table orders --output orders.csv
    reportkit templates list")]
struct Cli {
    /// Database connection URL; runs queries in-process
    #[arg(long, env = "REPORTKIT_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Report backend URL, used when no database URL is set
    #[arg(long, env = "REPORTKIT_API_URL", global = true)]
    api_url: Option<String>,

    /// Config file (default: ./reportkit.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Args, Clone)]
struct QueryArgs {
    /// Table to query
    #[arg(short, long)]
    table: Option<String>,

    /// Columns to select (default: all)
    #[arg(short, long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Filter expression, e.g. 'age>=30' or 'status IN open,closed'
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Raw SQL; switches to raw SQL mode
    #[arg(long)]
    sql: Option<String>,

    /// Sort column
    #[arg(long)]
    sort_by: Option<String>,

    /// Sort descending
    #[arg(long)]
    desc: bool,

    #[command(flatten)]
    paging: PagingArgs,
}

#[derive(Args, Clone)]
struct PagingArgs {
    /// Page number (1-based)
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Rows per page: 10, 25, 50 or 100
    #[arg(long, value_parser = parse_page_size)]
    page_size: Option<PageSize>,
}

#[derive(Args, Clone, Copy)]
struct ViewArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables, or the columns of one table
    Tables {
        table: Option<String>,
    },
    /// Show the filter operators allowed for a data type
    Operators {
        /// text, number, date or enum
        data_type: String,
    },
    /// Run a query and print one page of results
    Query {
        #[command(flatten)]
        query: QueryArgs,

        #[command(flatten)]
        view: ViewArgs,

        /// Only keep rows of the page containing this text
        #[arg(long)]
        search: Option<String>,

        /// Sort the fetched page by this column without refetching
        #[arg(long)]
        sort_local: Option<String>,

        /// Don't execute, just show the generated SQL
        #[arg(short, long)]
        dry_run: bool,
    },
    /// Export the full result as CSV
    Export {
        #[command(flatten)]
        query: QueryArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage saved templates
    Templates {
        #[command(subcommand)]
        command: TemplateCommands,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List saved templates
    List,
    /// Show one template by id or name
    Show { key: String },
    /// Save the described query as a template
    Save {
        name: String,

        /// Overwrite the template with this id
        #[arg(long)]
        id: Option<i64>,

        #[command(flatten)]
        query: QueryArgs,
    },
    /// Run a saved template
    Run {
        key: String,

        #[command(flatten)]
        paging: PagingArgs,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Delete a template by id
    Delete { id: i64 },
}

fn parse_page_size(s: &str) -> Result<PageSize, String> {
    let n: u32 = s.parse().map_err(|_| format!("Invalid page size: {}", s))?;
    PageSize::try_from(n)
}

struct Backend {
    collaborator: Box<dyn Collaborator>,
    templates: Box<dyn TemplateStore>,
    page_size: PageSize,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "reportkit=debug" } else { "reportkit=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Operators { data_type } = &cli.command {
        return show_operators(data_type);
    }

    let backend = connect(&cli).await?;

    match cli.command {
        Commands::Operators { .. } => Ok(()),
        Commands::Tables { table } => show_tables(&backend, table.as_deref()).await,
        Commands::Query {
            query,
            view,
            search,
            sort_local,
            dry_run,
        } => {
            let builder = builder_from(&backend, &query).await?;
            if dry_run {
                return show_sql(&builder);
            }
            run_query(&backend, builder, view.format, search.as_deref(), sort_local.as_deref()).await
        }
        Commands::Export { query, output } => {
            let builder = builder_from(&backend, &query).await?;
            export(&backend, &builder, output).await
        }
        Commands::Templates { command } => templates(&backend, command).await,
    }
}

async fn connect(cli: &Cli) -> anyhow::Result<Backend> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    }
    .with_env();

    let database_url = cli.database_url.as_deref().or(config.database_url());
    let page_size = config.page_size();

    if let Some(url) = database_url {
        if cli.verbose {
            eprintln!("{} {}", "Connecting to:".dimmed(), url);
        }
        let db = ReportDB::connect(url).await?;
        let path = config.templates_path();
        tracing::debug!(path = %path.display(), "using local template file");
        return Ok(Backend {
            collaborator: Box::new(db),
            templates: Box::new(FileTemplateStore::new(path)),
            page_size,
        });
    }

    let api_url = cli.api_url.as_deref().unwrap_or(config.api_url());
    if cli.verbose {
        eprintln!("{} {}", "Backend:".dimmed(), api_url);
    }
    let client = ApiClient::new(api_url);
    Ok(Backend {
        collaborator: Box::new(client.clone()),
        templates: Box::new(client),
        page_size,
    })
}

/// Turn command-line selections into builder state, typing filters from
/// the table's columns.
async fn builder_from(backend: &Backend, args: &QueryArgs) -> anyhow::Result<QueryBuilder> {
    let mut builder = QueryBuilder::new();

    if let Some(name) = &args.table {
        let columns = backend.collaborator.table_columns(name).await?;
        if columns.is_empty() && args.sql.is_none() {
            bail!("Table '{}' not found or has no columns", name);
        }
        builder.select_table(TableInfo {
            name: name.clone(),
            columns,
        });
        if args.columns.is_empty() {
            builder.select_all_columns();
        } else {
            builder.set_columns(args.columns.iter().cloned());
        }
    }

    for expr in &args.filters {
        let filter = Filter::parse(expr)?;
        let data_type = match builder.table() {
            Some(table) if !table.columns.is_empty() => table.find_column(&filter.field)?.data_type(),
            _ => DataType::default(),
        };
        builder
            .add_filter(filter.with_type(data_type))
            .with_context(|| format!("in filter '{}'", expr))?;
    }

    if let Some(sql) = &args.sql {
        builder.set_mode(Mode::RawSql).set_sql(sql.clone());
    }

    let order = if args.desc { SortOrder::Desc } else { SortOrder::Asc };
    builder
        .set_sort(args.sort_by.as_deref(), order)
        .context("in --sort-by")?
        .set_page_size(args.paging.page_size.unwrap_or(backend.page_size))
        .set_page(args.paging.page);

    Ok(builder)
}

fn show_sql(builder: &QueryBuilder) -> anyhow::Result<()> {
    let request = builder.build()?;
    println!("{}", "Generated SQL:".green().bold());
    println!("{}", request.to_sql().white());
    if let Some(count) = request.count_sql() {
        println!();
        println!("{}", "Count:".cyan());
        println!("{}", count.dimmed());
    }
    Ok(())
}

async fn run_query(
    backend: &Backend,
    builder: QueryBuilder,
    format: OutputFormat,
    search: Option<&str>,
    sort_local: Option<&str>,
) -> anyhow::Result<()> {
    let mut session = Session::new(builder);
    session.run(backend.collaborator.as_ref()).await?;

    let Some(view) = session.view_mut() else {
        return Ok(());
    };

    if let Some(column) = sort_local {
        let (_, order) = view.sort_page(column);
        tracing::debug!(column, %order, "sorted page locally");
    }

    let rows: Vec<Row> = match search {
        Some(term) => view.search(term).into_iter().cloned().collect(),
        None => view.rows().to_vec(),
    };
    format_output(&rows, format);

    if matches!(format, OutputFormat::Table) {
        print_footer(view.page(), rows.len(), search.is_some());
    }
    Ok(())
}

fn print_footer(page: &ResultPage, shown: usize, searched: bool) {
    println!();
    match page.range() {
        Some((start, end)) => println!(
            "Showing {}–{} of {} (page {} of {})",
            start.to_string().cyan(),
            end.to_string().cyan(),
            page.total().to_string().cyan(),
            page.page(),
            page.total_pages()
        ),
        None => println!("{}", "0 results".dimmed()),
    }
    if searched {
        println!("{} row(s) on this page match", shown.to_string().cyan());
    }
}

async fn export(backend: &Backend, builder: &QueryBuilder, output: Option<PathBuf>) -> anyhow::Result<()> {
    let request = builder.build()?;
    let bytes = backend.collaborator.export(&request).await?;
    if bytes.is_empty() {
        return Err(ReportError::from(ExportError::NothingToExport).into());
    }

    match output {
        Some(path) => {
            std::fs::write(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Wrote {}", "✓".green(), path.display().to_string().cyan());
        }
        None => println!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}

async fn templates(backend: &Backend, command: TemplateCommands) -> anyhow::Result<()> {
    let store = backend.templates.as_ref();

    match command {
        TemplateCommands::List => {
            let shelf = TemplateShelf::new(store.list().await?);
            if shelf.is_empty() {
                println!("{}", "No templates saved yet".dimmed());
                return Ok(());
            }
            for t in shelf.templates() {
                let id = t.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
                println!("{:>4}  {}", id.dimmed(), t.name.white().bold());
                println!("      {}", t.preview(100).dimmed());
            }
        }
        TemplateCommands::Show { key } => {
            let shelf = TemplateShelf::new(store.list().await?);
            let template = shelf
                .find(&key)
                .with_context(|| format!("Template '{}' not found", key))?;
            println!("{}", serde_json::to_string_pretty(template)?);
        }
        TemplateCommands::Save { name, id, query } => {
            let builder = builder_from(backend, &query).await?;
            let mut template = builder.to_template(&name)?;
            template.id = id;
            let saved = store.save(&template).await?;
            let id = saved.id.map(|id| id.to_string()).unwrap_or_default();
            println!("{} Saved '{}' (id {})", "✓".green(), saved.name.cyan(), id);
        }
        TemplateCommands::Run { key, paging, view } => {
            let shelf = TemplateShelf::new(store.list().await?);
            let template = shelf
                .find(&key)
                .with_context(|| format!("Template '{}' not found", key))?;

            let mut builder = QueryBuilder::new();
            builder
                .load_template(template)
                .set_page_size(paging.page_size.unwrap_or(backend.page_size))
                .set_page(paging.page);
            run_query(backend, builder, view.format, None, None).await?;
        }
        TemplateCommands::Delete { id } => {
            store.delete(id).await?;
            println!("{} Deleted template {}", "✓".green(), id);
        }
    }
    Ok(())
}

async fn show_tables(backend: &Backend, table: Option<&str>) -> anyhow::Result<()> {
    match table {
        Some(name) => {
            let columns = backend.collaborator.table_columns(name).await?;
            if columns.is_empty() {
                bail!("Table '{}' not found or has no columns", name);
            }
            println!("{}", name.cyan().bold());
            for c in &columns {
                let nullable = if c.nullable { "NULL" } else { "NOT NULL" };
                println!(
                    "  {:24} {:28} {:8} {}",
                    c.name.white(),
                    c.sql_type.dimmed(),
                    c.data_type().to_string().yellow(),
                    nullable.dimmed()
                );
            }
        }
        None => {
            let tables = backend.collaborator.tables().await?;
            if tables.is_empty() {
                println!("{}", "(no tables)".dimmed());
            }
            for t in &tables {
                println!("{:32} {} column(s)", t.name.white(), t.columns.len().to_string().cyan());
            }
        }
    }
    Ok(())
}

fn show_operators(data_type: &str) -> anyhow::Result<()> {
    let data_type: DataType = data_type.parse()?;
    println!("{} {}", "Operators for".dimmed(), data_type.to_string().cyan().bold());
    for op in operators_for(data_type) {
        println!("  {:8} {}", op.sql_symbol().yellow(), op.label());
    }
    Ok(())
}

fn format_output(rows: &[Row], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(rows)),
        OutputFormat::Csv => match to_csv(rows) {
            Ok(csv) => println!("{}", csv),
            Err(e) => eprintln!("{}", e.to_string().dimmed()),
        },
        OutputFormat::Table => print_table(rows),
    }
}

fn print_table(rows: &[Row]) {
    let Some(first) = rows.first() else {
        println!("{}", "(no results)".dimmed());
        return;
    };
    let columns: Vec<&String> = first.keys().collect();

    let mut widths: HashMap<&String, usize> = columns.iter().map(|c| (*c, c.chars().count())).collect();
    for row in rows {
        for (col, val) in row {
            let len = val_to_string(val).chars().count();
            if let Some(w) = widths.get_mut(col) {
                *w = (*w).max(len);
            }
        }
    }

    let header: Vec<String> = columns
        .iter()
        .map(|c| format!("{:width$}", c, width = widths[*c]))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    let sep: Vec<String> = columns.iter().map(|c| "─".repeat(widths[*c])).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| {
                let val = row.get(c.as_str()).map(val_to_string).unwrap_or_default();
                format!("{:width$}", val, width = widths[*c])
            })
            .collect();
        println!("{}", cells.join(" │ "));
    }
}

fn val_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}
