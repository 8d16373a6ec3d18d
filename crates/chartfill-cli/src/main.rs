use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chartfill::{
    fill_chart, inspect_chart, CacheDiagnostic, ChartKind, ChartPart, FillOutput, FillPolicy,
    LinkState, NewData, SnapshotFormat,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SnapshotFormatArg {
    PackagedSpreadsheet,
    LegacyBinary,
    None,
}

impl SnapshotFormatArg {
    fn to_format(self) -> Option<SnapshotFormat> {
        match self {
            SnapshotFormatArg::PackagedSpreadsheet => Some(SnapshotFormat::PackagedSpreadsheet),
            SnapshotFormatArg::LegacyBinary => Some(SnapshotFormat::LegacyBinary),
            SnapshotFormatArg::None => None,
        }
    }
}

#[derive(Parser)]
#[command(about = "Synchronize the cached data of DrawingML chart parts.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the chart kind, cache model, layout and link state as JSON.
    Inspect(InspectArgs),
    /// Fill a chart part with new data and write the updated parts.
    Fill(FillArgs),
}

#[derive(clap::Args)]
struct InspectArgs {
    /// Chart part XML (e.g. extracted `xl/charts/chart1.xml`).
    chart: PathBuf,

    /// Relationship part of the chart (`_rels/chart1.xml.rels`).
    #[arg(long)]
    rels: Option<PathBuf>,

    /// OPC part name of the chart (default: `xl/charts/<file name>`).
    #[arg(long)]
    part_name: Option<String>,
}

#[derive(clap::Args)]
struct FillArgs {
    /// Chart part XML.
    chart: PathBuf,

    /// New data as JSON (categorical `labels`/`series` or XY `series`).
    #[arg(long, value_name = "PATH")]
    data: PathBuf,

    /// Relationship part of the chart.
    #[arg(long)]
    rels: Option<PathBuf>,

    /// Fill policy as JSON. Flags below override its values.
    #[arg(long, value_name = "PATH")]
    policy: Option<PathBuf>,

    /// Merge against the original cache instead of overwriting it.
    #[arg(long)]
    keep_original_for_missing: bool,

    /// Keep the chart's external workbook link (pointing it at a fresh snapshot).
    #[arg(long)]
    keep_external_link: bool,

    /// Offset for synthesized XY x values (position `i` gets `N + 1 + i`).
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    axis_base: Option<i64>,

    /// Snapshot workbook written for a kept link.
    #[arg(long, value_enum)]
    snapshot_format: Option<SnapshotFormatArg>,

    /// OPC part name of the chart (default: `xl/charts/<file name>`).
    #[arg(long)]
    part_name: Option<String>,

    /// Output directory; receives `charts/`, `charts/_rels/` and `embeddings/`.
    #[arg(long, value_name = "DIR")]
    out_dir: PathBuf,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FillReport<'a> {
    part_name: &'a str,
    kind: ChartKind,
    series_before: usize,
    series_after: usize,
    chart: String,
    rels: RelsOutcome,
    snapshot: Option<String>,
    removed_targets: &'a [String],
    link: &'a LinkState,
    diagnostics: &'a [CacheDiagnostic],
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum RelsOutcome {
    Written { path: String },
    Deleted,
    Absent,
}

fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().command {
        Command::Inspect(args) => run_inspect(&args),
        Command::Fill(args) => run_fill(&args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let part_name = resolve_part_name(args.part_name.as_deref(), &args.chart)?;
    let xml = read_file(&args.chart)?;
    let rels = args.rels.as_deref().map(read_file).transpose()?;

    let mut part = ChartPart::new(&part_name, &xml);
    if let Some(rels) = rels.as_deref() {
        part = part.with_rels(rels);
    }
    let inspection =
        inspect_chart(part).with_context(|| format!("inspect {}", args.chart.display()))?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &inspection)?;
    handle.write_all(b"\n")?;
    Ok(())
}

fn run_fill(args: &FillArgs) -> Result<()> {
    let part_name = resolve_part_name(args.part_name.as_deref(), &args.chart)?;
    let policy = load_policy(args)?;
    let data_bytes = read_file(&args.data)?;
    let data = NewData::from_json(&data_bytes)
        .with_context(|| format!("parse data {}", args.data.display()))?;
    let xml = read_file(&args.chart)?;
    let rels = args.rels.as_deref().map(read_file).transpose()?;

    let mut part = ChartPart::new(&part_name, &xml);
    if let Some(rels) = rels.as_deref() {
        part = part.with_rels(rels);
    }
    tracing::info!(part = %part_name, ?policy, "filling chart");
    let output = fill_chart(part, &data, &policy)
        .with_context(|| format!("fill {}", args.chart.display()))?;

    let report = write_outputs(args, &part_name, &output, rels.is_some())?;
    match args.format {
        OutputFormat::Json => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer(&mut handle, &report)?;
            handle.write_all(b"\n")?;
        }
        OutputFormat::Text => print_text_report(&report),
    }
    Ok(())
}

fn load_policy(args: &FillArgs) -> Result<FillPolicy> {
    let mut policy = match &args.policy {
        Some(path) => {
            let bytes = read_file(path)?;
            FillPolicy::from_json(&bytes)
                .with_context(|| format!("parse policy {}", path.display()))?
        }
        None => FillPolicy::default(),
    };
    if args.keep_original_for_missing {
        policy.keep_original_for_missing = true;
    }
    if args.keep_external_link {
        policy.keep_external_link = true;
    }
    if let Some(base) = args.axis_base {
        policy.axis_synthesis_base = base;
    }
    if let Some(format) = args.snapshot_format {
        policy.external_snapshot_format = format.to_format();
    }
    Ok(policy)
}

fn write_outputs<'a>(
    args: &FillArgs,
    part_name: &'a str,
    output: &'a FillOutput,
    had_rels: bool,
) -> Result<FillReport<'a>> {
    let file_name = part_file_name(part_name);
    let charts_dir = args.out_dir.join("charts");
    std::fs::create_dir_all(&charts_dir)
        .with_context(|| format!("create {}", charts_dir.display()))?;

    let chart_path = charts_dir.join(file_name);
    write_file(&chart_path, &output.chart_xml)?;

    let rels_path = charts_dir.join("_rels").join(format!("{file_name}.rels"));
    let rels = match &output.rels_xml {
        Some(bytes) => {
            write_file(&rels_path, bytes)?;
            RelsOutcome::Written {
                path: rels_path.display().to_string(),
            }
        }
        None => {
            if rels_path.exists() {
                std::fs::remove_file(&rels_path)
                    .with_context(|| format!("remove {}", rels_path.display()))?;
            }
            if had_rels {
                RelsOutcome::Deleted
            } else {
                RelsOutcome::Absent
            }
        }
    };

    let snapshot = match &output.snapshot {
        Some(snapshot) => {
            let path = args
                .out_dir
                .join("embeddings")
                .join(part_file_name(&snapshot.part_name));
            write_file(&path, &snapshot.bytes)?;
            Some(path.display().to_string())
        }
        None => None,
    };

    Ok(FillReport {
        part_name,
        kind: output.kind,
        series_before: output.original.series_count(),
        series_after: output.final_model.series_count(),
        chart: chart_path.display().to_string(),
        rels,
        snapshot,
        removed_targets: &output.removed_targets,
        link: &output.link,
        diagnostics: &output.diagnostics,
    })
}

fn print_text_report(report: &FillReport<'_>) {
    println!("Chart fill report");
    println!("  part: {}", report.part_name);
    println!("  kind: {:?}", report.kind);
    println!(
        "  series: {} -> {}",
        report.series_before, report.series_after
    );
    println!("  chart: {}", report.chart);
    match &report.rels {
        RelsOutcome::Written { path } => println!("  rels: {path}"),
        RelsOutcome::Deleted => println!("  rels: deleted (no relationships left)"),
        RelsOutcome::Absent => println!("  rels: (none)"),
    }
    match &report.link {
        LinkState::Linked(link) => println!(
            "  link: kept ({} -> {})",
            link.rel_id,
            link.target.as_deref().unwrap_or("(unresolved)")
        ),
        LinkState::Unlinked => println!("  link: removed"),
    }
    if let Some(snapshot) = &report.snapshot {
        println!("  snapshot: {snapshot}");
    }
    for target in report.removed_targets {
        println!("  orphaned part: {target}");
    }
    for diagnostic in report.diagnostics {
        println!("  warning: {}: {}", diagnostic.location, diagnostic.message);
    }
}

fn resolve_part_name(explicit: Option<&str>, chart: &Path) -> Result<String> {
    if let Some(name) = explicit {
        let trimmed = name.trim().replace('\\', "/");
        let trimmed = trimmed.trim_start_matches('/');
        if trimmed.is_empty() {
            anyhow::bail!("--part-name must not be empty");
        }
        return Ok(trimmed.to_string());
    }
    let file_name = chart
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("chart path {} has no file name", chart.display()))?;
    Ok(format!("xl/charts/{file_name}"))
}

fn part_file_name(part_name: &str) -> &str {
    part_name.rsplit('/').next().unwrap_or(part_name)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read {}", path.display()))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}
