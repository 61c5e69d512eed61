use anyhow::Result;
use fmi_diagnostic::{
    cli::{Cli, Commands, GlobalArgs},
    config::AnalysisConfig,
    error::AnalysisError,
    filter::resolve_charts,
    index::{classify, life_history_category},
    pipeline::{self, Stage},
    render::ChartKind,
    source::candidates_with_override,
    ui::{ConsoleUi, SilentUi, Ui},
};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(global: &GlobalArgs) {
    let level = match (global.quiet, global.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "fmi_diagnostic=debug,warn",
        (false, _) => "fmi_diagnostic=trace,info",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Configuration file, then command-line overrides
fn load_config(global: &GlobalArgs) -> Result<AnalysisConfig> {
    let mut config = AnalysisConfig::load(global.config.as_deref())?;

    config.paths.candidates =
        candidates_with_override(global.db.as_deref(), &config.paths.candidates);
    if let Some(dir) = &global.output_dir {
        // figures follow the output directory unless the file placed them elsewhere
        if let Ok(rest) = config.paths.figure_dir.strip_prefix(&config.paths.output_dir) {
            config.paths.figure_dir = dir.join(rest);
        }
        config.paths.output_dir = dir.clone();
    }
    if let Some(table) = &global.collapse_table {
        config.paths.collapse_table = Some(table.clone());
    }
    Ok(config)
}

fn run_stage<U: Ui>(
    stage: Stage,
    config: &AnalysisConfig,
    charts: &[ChartKind],
    ui: &mut U,
) -> Result<()> {
    let start = Instant::now();
    let report = pipeline::run(stage, config, charts, ui)?;

    let summary = &report.summary;
    ui.log(format!(
        "\n{} stocks, {} stock-years, {} tables, {} charts in {:.1}s",
        summary.extraction.stocks_retained,
        summary.extraction.stock_years_retained,
        summary.tables.len(),
        summary.charts.len(),
        start.elapsed().as_secs_f64()
    ));

    // every artifact has been attempted by now
    let failed = report.failed_artifacts();
    if failed > 0 {
        let total = report.attempted_artifacts();
        return Err(AnalysisError::Output { failed, total }.into());
    }
    Ok(())
}

fn dispatch<U: Ui>(command: Commands, config: &AnalysisConfig, ui: &mut U) -> Result<()> {
    match command {
        Commands::Run { include, exclude } => {
            let charts = resolve_charts(include, exclude)?;
            run_stage(Stage::Run, config, &charts, ui)
        }
        Commands::Extract => run_stage(Stage::Extract, config, &[], ui),
        Commands::Validate => run_stage(Stage::Validate, config, &[], ui),
        Commands::Render { include, exclude } => {
            let charts = resolve_charts(include, exclude)?;
            run_stage(Stage::Render, config, &charts, ui)
        }
        Commands::Classify { .. } | Commands::ListCharts => Ok(()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(&cli.global);

    match cli.command {
        Commands::ListCharts => {
            println!("Available charts:\n");
            for kind in ChartKind::ALL {
                println!("  {:<18} {}", kind.name(), kind.description());
            }
            return Ok(());
        }
        Commands::Classify { f, m } => {
            let config = load_config(&cli.global)?;
            let (fmi, zone) = classify(f, m, &config.index.zones)?;
            let category = life_history_category(m, &config.index.categories);
            println!("F/M = {:.4}", fmi);
            println!("zone: {}", zone);
            println!("life history: {}", category);
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli.global)?;
    if cli.global.quiet {
        dispatch(cli.command, &config, &mut SilentUi::new())
    } else {
        dispatch(cli.command, &config, &mut ConsoleUi::new())
    }
}
