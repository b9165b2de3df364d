use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use scopy_config::{AppConfig, ConfigError};
use scopy_core::memory::MemoryDocument;
use scopy_core::store::DocumentStore;
use scopy_engine::errors::EngineError;
use scopy_engine::lookups::{BatchLookups, DEFAULT_NO_TEMPLATE_LABEL};
use scopy_engine::orchestrator::{BatchReport, DuplicationOrchestrator};
use scopy_engine::request::{BatchPlanner, PlannerOptions, RequestedSheet};
use scopy_io::{DocumentLoader, DocumentSaver, JsonFacade};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "scopy", about = "Duplicate sheets together with their viewports and annotations")]
struct Cli {
    /// 配置文件路径，缺省时自动发现。
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List sheets and the views placed on them.
    List {
        document: PathBuf,
    },
    /// Copy one or more sheets into new sheets.
    Copy(CopyArgs),
}

#[derive(Debug, Args)]
struct CopyArgs {
    document: PathBuf,

    /// Number of the sheet to copy; may be repeated.
    #[arg(long = "sheet", required = true)]
    sheets: Vec<String>,

    /// How many copies of each sheet to create.
    #[arg(long, default_value_t = 1)]
    copies: usize,

    /// Duplicate views together with their view-specific detailing.
    #[arg(long)]
    detailing: bool,

    /// Recreate a view as a new plan on a level instead of copying it, as `VIEW=LEVEL`.
    #[arg(long = "on-level", value_name = "VIEW=LEVEL")]
    on_level: Vec<String>,

    /// Where to write the result; defaults to overwriting the input.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone());
    init_logging(&config);

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "命令执行失败");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &AppConfig) -> Result<ExitCode> {
    match command {
        Command::List { document } => {
            let doc = JsonFacade::new().load(&document)?;
            print_listing(&doc);
            Ok(ExitCode::SUCCESS)
        }
        Command::Copy(args) => copy_sheets(args, config),
    }
}

fn print_listing(doc: &MemoryDocument) {
    let lookups = BatchLookups::from_store(doc, DEFAULT_NO_TEMPLATE_LABEL);
    if !lookups.sheet_categories().is_empty() {
        println!("categories: {}", lookups.sheet_categories().join(", "));
    }

    let mut sheets = doc.sheets();
    sheets.sort_by(|a, b| a.number.cmp(&b.number));
    for sheet in sheets {
        if sheet.category.is_empty() {
            println!("{}\t{}", sheet.number, sheet.title);
        } else {
            println!("{}\t{}\t[{}]", sheet.number, sheet.title, sheet.category);
        }
        for viewport in doc.viewports_on(sheet.id) {
            let name = doc
                .view(viewport.view)
                .map(|view| view.name.as_str())
                .unwrap_or("<missing view>");
            println!(
                "  {} {} @ ({}, {})",
                viewport.view,
                name,
                viewport.center.x(),
                viewport.center.y()
            );
        }
    }
}

fn copy_sheets(args: CopyArgs, config: &AppConfig) -> Result<ExitCode> {
    let facade = JsonFacade::new();
    let mut doc = facade.load(&args.document)?;

    let options = PlannerOptions {
        title_suffix: config.copy.title_suffix.clone(),
        copy_detailing: args.detailing || config.copy.copy_detailing,
        share_legends: config.copy.share_legends,
    };
    let batch = plan_batch(&doc, options, &args)?;
    info!(sheets = batch.len(), "开始复制图纸");

    let outcome = DuplicationOrchestrator::new(&mut doc)
        .with_no_template_label(config.copy.no_template_label.as_str())
        .run(&batch);
    let report = match outcome {
        Ok(report) => report,
        Err(EngineError::CommitFailed(err)) => {
            error!(error = %err, "批次未能提交，文档保持不变");
            eprintln!("error: batch was not committed: {err}");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };
    print_report(&report);

    let output = args.output.unwrap_or(args.document);
    facade
        .save(&doc, &output)
        .with_context(|| format!("保存文档到 {} 失败", output.display()))?;
    Ok(ExitCode::SUCCESS)
}

fn plan_batch(
    doc: &MemoryDocument,
    options: PlannerOptions,
    args: &CopyArgs,
) -> Result<Vec<RequestedSheet>> {
    let mut recreate = Vec::new();
    for entry in &args.on_level {
        let Some((view_name, level)) = entry.split_once('=') else {
            bail!("expected VIEW=LEVEL, got {entry:?}");
        };
        let Some(view) = doc.view_by_name(view_name.trim()) else {
            bail!("no view named {:?}", view_name.trim());
        };
        recreate.push((view.id, level.trim().to_string()));
    }

    let mut planner = BatchPlanner::new(doc, options);
    for number in &args.sheets {
        for _ in 0..args.copies {
            planner.add_sheet_by_number(number)?;
            let index = planner.sheets().len() - 1;
            for (view, level) in &recreate {
                if !planner.recreate_on_level(index, *view, level.as_str()) {
                    warn!(sheet = %number, view = view.get(), "视图未放置在源图纸上，忽略标高设置");
                }
            }
        }
    }
    Ok(planner.into_batch())
}

fn print_report(report: &BatchReport) {
    print!("{}", report.summary_text());
    for skipped in &report.skipped_sheets {
        println!("skipped sheet {}: {}", skipped.number, skipped.reason);
    }
    for skipped in &report.skipped_viewports {
        println!(
            "skipped viewport {} ({}) on {}: {}",
            skipped.view, skipped.mode, skipped.sheet_number, skipped.reason
        );
    }
    for failure in &report.annotation_failures {
        println!("annotations not copied to {}: {}", failure.sheet_number, failure.reason);
    }
    for orphan in &report.orphaned_views {
        println!(
            "view {} was created for {} but not placed",
            orphan.view, orphan.sheet_number
        );
    }
    for unresolved in &report.unresolved_templates {
        println!(
            "template {:?} not found for view {} on {}",
            unresolved.template, unresolved.view, unresolved.sheet_number
        );
    }
    println!(
        "{} sheet(s) created, {} sheet(s) skipped, {} viewport(s) skipped",
        report.sheets.len(),
        report.skipped_sheets.len(),
        report.skipped_viewports.len()
    );
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            eprintln!("warning: {err}; using built-in defaults");
            AppConfig::default()
        }),
        None => AppConfig::discover().unwrap_or_else(|err| {
            match &err {
                ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                    eprintln!("warning: {} ({}); using built-in defaults", err, path.display());
                }
                ConfigError::Context { .. } => {
                    eprintln!("warning: {err}; using built-in defaults");
                }
            }
            AppConfig::default()
        }),
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(config.logging.level.as_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
