use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use local_rank_tracker::config::DEFAULT_CONFIG_FILE;
use local_rank_tracker::dataset::format_long_date;
use local_rank_tracker::{report, snapshot, Config, Session, ViewMode, ViewRequest};

const ACCEPTED_EXTENSIONS: [&str; 2] = ["csv", "tsv"];

#[derive(Parser)]
#[command(name = "rank-tracker")]
#[command(about = "Local pack rank tracking reports from rank-tracker exports", long_about = None)]
struct Cli {
    /// Path to a configuration file (defaults to .ranktracker.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Tab-separated export to load; repeat to accumulate several uploads
    #[arg(short, long = "input", required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .ranktracker.toml
    InitConfig,
    /// Show what the loaded exports contain
    Summary {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Monthly statistics and rank chart for one keyword
    Keyword {
        #[command(flatten)]
        inputs: Inputs,
        /// Keyword to show (defaults to the first keyword of the first upload)
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
    /// Monthly statistics and rank chart for one business
    Business {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long)]
        business: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
    /// Client performance summary, optionally against a competitor
    Compare {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long)]
        primary: String,
        #[arg(long)]
        competitor: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
    /// Full report covering every keyword and business
    Report {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long)]
        primary: Option<String>,
        #[arg(long, requires = "primary")]
        competitor: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig = cli.command {
        return init_config();
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load_default()
            .context("failed to load .ranktracker.toml")?
            .unwrap_or_default(),
    };
    if cli.verbose {
        config.general.verbose = true;
    }
    init_logging(config.general.verbose);

    match cli.command {
        Commands::InitConfig => init_config()?,
        Commands::Summary { inputs } => {
            let session = load_session(&inputs.inputs)?;
            print_summary(&session);
        }
        Commands::Keyword {
            inputs,
            keyword,
            format,
        } => {
            let mut session = load_session(&inputs.inputs)?;
            session.set_view(ViewMode::Keyword);
            if keyword.is_some() {
                session.select_keyword(keyword);
            }
            show_selection(&session, &config, format)?;
        }
        Commands::Business {
            inputs,
            business,
            format,
        } => {
            let mut session = load_session(&inputs.inputs)?;
            session.set_view(ViewMode::Business);
            session.select_business(Some(business));
            show_selection(&session, &config, format)?;
        }
        Commands::Compare {
            inputs,
            primary,
            competitor,
            format,
        } => {
            let mut session = load_session(&inputs.inputs)?;
            session.set_view(ViewMode::Comparison);
            select_comparison(&mut session, Some(primary), competitor)?;
            show_selection(&session, &config, format)?;
        }
        Commands::Report {
            inputs,
            primary,
            competitor,
            out,
            format,
        } => {
            let mut session = load_session(&inputs.inputs)?;
            session.set_view(ViewMode::Comparison);
            select_comparison(&mut session, primary, competitor)?;

            let comparison = ViewRequest::from_selection(&session.selection);
            let document = report::build_document(&session.dataset, &config, comparison.as_ref())?;
            let rendered = match format {
                OutputFormat::Markdown => report::render_markdown(&document),
                OutputFormat::Json => report::render_json(&document)?,
            };

            let out = out.unwrap_or_else(|| PathBuf::from(&config.general.output));
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn init_config() -> anyhow::Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        bail!("{DEFAULT_CONFIG_FILE} already exists; remove it first or edit it manually");
    }
    std::fs::write(path, Config::default_toml()?)
        .with_context(|| format!("failed to write {DEFAULT_CONFIG_FILE}"))?;
    println!("Created {DEFAULT_CONFIG_FILE} with default settings.");
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Load every input in order. A rejected upload is reported and skipped;
/// whatever loaded before it stays in the session.
fn load_session(inputs: &[PathBuf]) -> anyhow::Result<Session> {
    let mut session = Session::new();

    for path in inputs {
        let accepted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !accepted {
            warn!(path = %path.display(), "skipping file: only .csv and .tsv exports are accepted");
            continue;
        }

        let source = path.display().to_string();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(source = %source, error = %err, "failed to read upload; skipping");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);

        // A rejected upload is already logged by the session.
        if let Ok(batch) = session.upload(&source, &text) {
            debug!(
                source = %source,
                batch = %batch.id,
                accepted = batch.accepted,
                rejected = batch.rejected,
                "upload loaded"
            );
        }
    }

    if session.dataset.is_empty() {
        bail!("no rank data loaded; check the export format");
    }
    Ok(session)
}

/// Apply a primary/competitor pair, refusing a competitor the session does
/// not offer (the primary itself or a business absent from the data).
fn select_comparison(
    session: &mut Session,
    primary: Option<String>,
    competitor: Option<String>,
) -> anyhow::Result<()> {
    session.select_primary(primary);
    if let Some(name) = competitor {
        if !session.select_competitor(Some(name.clone())) {
            bail!("competitor {name} must be a different business present in the data");
        }
    }
    Ok(())
}

fn print_summary(session: &Session) {
    let dataset = &session.dataset;
    if let Some((first, last)) = dataset.date_range() {
        println!(
            "Data loaded: {} entries | Date range: {} - {}",
            dataset.len(),
            format_long_date(first),
            format_long_date(last)
        );
    }
    println!("Tracked days: {}", dataset.total_days());
    for batch in dataset.uploads() {
        println!(
            "- {} ({}): {} accepted, {} skipped, loaded {}",
            batch.source,
            batch.id,
            batch.accepted,
            batch.rejected,
            batch.loaded_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("Keywords: {}", dataset.keywords().join(", "));
    println!("Businesses: {}", dataset.businesses().join(", "));
}

fn show_selection(session: &Session, config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let Some(request) = ViewRequest::from_selection(&session.selection) else {
        bail!("nothing selected for this view");
    };
    let view = snapshot::snapshot(&session.dataset, &request, config)?;
    match format {
        OutputFormat::Markdown => print!("{}", report::render_view_markdown(&view)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "Date\tKeyword\tLocation\tRank\tPosition in Pack\tBusiness Name\tGoogle Rating\tRatings Count\tGlobal Monthly Search Volume\tRegional Monthly Search Volume
2024-01-01\tplumber\tAustin\t1\t1\tAcme\t4.5\t40\t1000\t100
2024-01-01\tplumber\tAustin\t2\t2\tBolt\t4.0\t90\t1000\t100";

    fn session() -> Session {
        let mut session = Session::new();
        session.upload("export.tsv", EXPORT).unwrap();
        session
    }

    #[test]
    fn comparison_rejects_the_primary_as_competitor() {
        let mut session = session();
        let err = select_comparison(&mut session, Some("Acme".into()), Some("Acme".into()))
            .unwrap_err();
        assert!(err.to_string().contains("competitor Acme"));
        assert_eq!(session.selection.competitor, None);
    }

    #[test]
    fn comparison_rejects_unknown_competitors() {
        let mut session = session();
        assert!(select_comparison(&mut session, Some("Acme".into()), Some("Nobody".into())).is_err());
    }

    #[test]
    fn comparison_accepts_a_listed_competitor() {
        let mut session = session();
        select_comparison(&mut session, Some("Acme".into()), Some("Bolt".into())).unwrap();
        assert_eq!(session.selection.primary.as_deref(), Some("Acme"));
        assert_eq!(session.selection.competitor.as_deref(), Some("Bolt"));

        select_comparison(&mut session, Some("Bolt".into()), None).unwrap();
        assert_eq!(session.selection.competitor, None);
    }
}
