use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use rtexp_core::report::ReportRow;
use rtexp_core::*;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

/// Exit code used when no exposure chart row applies to a shot
const EXIT_NO_CHART_MATCH: u8 = 2;

#[derive(Parser)]
#[command(name = "rtexp")]
#[command(about = "Radiography exposure time calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the decayed activity of a source
    Decay {
        #[arg(long)]
        isotope: Isotope,

        /// Reference activity in MBq
        #[arg(long)]
        a0: f64,

        /// Calibration date (YYYY-MM-DD)
        #[arg(long)]
        ref_date: NaiveDate,

        /// Instant of interest (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
    },

    /// Manage registered sources
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Manage the exposure chart
    Chart {
        #[command(subcommand)]
        action: ChartAction,
    },

    /// Manage castings
    Casting {
        #[command(subcommand)]
        action: CastingAction,
    },

    /// Compute and record an exposure line
    Expose(ExposeArgs),

    /// List recorded exposure lines with totals
    Report(ReportArgs),
}

#[derive(Subcommand)]
enum SourceAction {
    /// Register a new sealed source
    Add {
        #[arg(long)]
        isotope: Isotope,

        /// Reference activity in MBq
        #[arg(long)]
        a0: f64,

        /// Calibration date (YYYY-MM-DD)
        #[arg(long)]
        ref_date: NaiveDate,

        #[arg(long)]
        serial: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List sources with their current activity
    List,

    /// Retire a source
    Remove { id: Uuid },
}

#[derive(Subcommand)]
enum ChartAction {
    /// Show the active chart
    List,

    /// Add a single chart row
    Add(ChartRowArgs),

    /// Remove a chart row by id
    Remove { id: Uuid },

    /// Replace the chart with rows from a CSV file
    Import { path: PathBuf },

    /// Validate the active chart and report overlapping bands
    Check,
}

#[derive(clap::Args)]
struct ChartRowArgs {
    #[arg(long)]
    isotope: Isotope,

    #[arg(long)]
    technique: String,

    /// Film speed designation
    #[arg(long)]
    film: String,

    /// Material; defaults to the configured material
    #[arg(long)]
    material: Option<String>,

    /// Lower edge of the thickness band in mm (inclusive)
    #[arg(long)]
    thickness_min: f64,

    /// Upper edge of the thickness band in mm (inclusive)
    #[arg(long)]
    thickness_max: f64,

    /// Chart constant K
    #[arg(long)]
    base_constant: f64,

    /// Thickness exponent; 0 disables the thickness term
    #[arg(long, default_value_t = 0.0)]
    alpha: f64,

    #[arg(long)]
    remarks: Option<String>,
}

#[derive(Subcommand)]
enum CastingAction {
    /// Open a new casting
    Open {
        #[arg(long)]
        name: String,

        #[arg(long)]
        customer: String,

        /// Inspection date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        heat_no: Option<String>,

        #[arg(long)]
        rt_no: Option<String>,

        #[arg(long)]
        area_coverage: Option<String>,
    },

    /// Mark a casting completed
    Close { id: Uuid },

    /// Reopen a completed casting
    Reopen { id: Uuid },

    /// List castings
    List,
}

#[derive(clap::Args)]
struct ExposeArgs {
    /// Casting to record against (not needed with --dry-run)
    #[arg(long)]
    casting: Option<Uuid>,

    #[arg(long)]
    source: Uuid,

    #[arg(long)]
    technique: String,

    /// Film speed designation
    #[arg(long)]
    film: String,

    /// Material thickness in mm
    #[arg(long)]
    thickness: f64,

    /// Source-to-film distance in mm
    #[arg(long)]
    sfd: f64,

    /// Number of films in the batch
    #[arg(long, default_value_t = 1)]
    films: u32,

    /// Material; defaults to the configured material
    #[arg(long)]
    material: Option<String>,

    /// Setting time per film in seconds; defaults to the configured value
    #[arg(long)]
    setting: Option<f64>,

    /// Movement time per film in seconds; defaults to the configured value
    #[arg(long)]
    movement: Option<f64>,

    /// Exposure instant (RFC 3339 or YYYY-MM-DD); defaults to now
    #[arg(long, value_parser = parse_instant)]
    at: Option<DateTime<Utc>>,

    /// Compute only, do not record
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Customer name (substring, case-insensitive)
    #[arg(long)]
    customer: Option<String>,

    #[arg(long)]
    casting: Option<Uuid>,

    #[arg(long)]
    isotope: Option<Isotope>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Casting status (open, completed)
    #[arg(long)]
    status: Option<CastingStatus>,
}

/// How a command finished; `main` maps this to the exit code
enum Outcome {
    Done,
    NoChartMatch,
}

fn main() -> ExitCode {
    rtexp_core::logging::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::NoChartMatch) => ExitCode::from(EXIT_NO_CHART_MATCH),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Outcome> {
    let mut env = Env {
        data_dir: cli.data_dir,
        config: None,
    };

    match cli.command {
        Commands::Expose(args) => return cmd_expose(&mut env, args),
        Commands::Decay {
            isotope,
            a0,
            ref_date,
            at,
        } => cmd_decay(isotope, a0, ref_date, at)?,
        Commands::Source { action } => cmd_source(&env.layout()?, action)?,
        Commands::Chart { action } => cmd_chart(&mut env, action)?,
        Commands::Casting { action } => cmd_casting(&env.layout()?, action)?,
        Commands::Report(args) => cmd_report(&env.layout()?, args)?,
    }
    Ok(Outcome::Done)
}

/// Config and data directory, resolved on first use
///
/// `decay` and commands run with `--data-dir` never read the config file.
struct Env {
    data_dir: Option<PathBuf>,
    config: Option<Config>,
}

impl Env {
    fn config(&mut self) -> Result<&Config> {
        let config = match self.config.take() {
            Some(config) => config,
            None => Config::load()?,
        };
        Ok(self.config.insert(config))
    }

    fn layout(&mut self) -> Result<DataLayout> {
        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => self.config()?.data.data_dir.clone(),
        };
        tracing::debug!("Using data directory {:?}", data_dir);
        Ok(DataLayout::new(data_dir))
    }
}

fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    s.parse::<NaiveDate>()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| format!("expected RFC 3339 timestamp or YYYY-MM-DD, got '{}'", s))
}

fn cmd_decay(isotope: Isotope, a0: f64, ref_date: NaiveDate, at: Option<DateTime<Utc>>) -> Result<()> {
    let at = at.unwrap_or_else(Utc::now);
    let reference = ref_date.and_time(NaiveTime::MIN).and_utc();
    let activity = decayed_activity(a0, reference, at, isotope)?;
    let elapsed = decay::elapsed_days(reference, at);

    println!("Isotope:   {} (half-life {:.2} days)", isotope, half_life_days(isotope));
    println!("Elapsed:   {:.2} days", elapsed);
    println!("A_eff:     {:.1} MBq", activity);
    Ok(())
}

fn cmd_source(layout: &DataLayout, action: SourceAction) -> Result<()> {
    match action {
        SourceAction::Add {
            isotope,
            a0,
            ref_date,
            serial,
            notes,
        } => {
            let source = Source {
                id: Uuid::new_v4(),
                isotope,
                serial_no: serial,
                a0_mbq: a0,
                ref_date,
                notes,
            };
            let id = source.id;
            Registry::update(&layout.registry_path(), |r| r.add_source(source))?;

            println!("✓ Source registered");
            println!("Source id: {}", id);
        }
        SourceAction::List => {
            let registry = layout.load_registry()?;
            let now = Utc::now();
            if registry.sources.is_empty() {
                println!("No sources registered.");
                return Ok(());
            }
            for source in registry.sources_sorted() {
                println!(
                    "{}  {:<6}  {:<10}  A0 {:>9.1} MBq @ {}  now {:>9.1} MBq",
                    source.id,
                    source.isotope,
                    source.serial_no.as_deref().unwrap_or("-"),
                    source.a0_mbq,
                    source.ref_date,
                    source.activity_at(now)?
                );
            }
        }
        SourceAction::Remove { id } => {
            let source = Registry::update(&layout.registry_path(), |r| r.remove_source(id))?;
            println!(
                "✓ Source {} removed ({} {})",
                id,
                source.isotope,
                source.serial_no.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

fn cmd_chart(env: &mut Env, action: ChartAction) -> Result<()> {
    let layout = env.layout()?;
    match action {
        ChartAction::List => {
            let chart = layout.load_chart()?;
            if chart.is_empty() {
                println!("Chart is empty.");
            }
            for entry in chart.entries() {
                println!(
                    "{}  {:<6}  {:<8}  {:<4}  {:<8}  {:>6}-{:<6} mm  K {:<8}  α {:<5}  {}",
                    entry.id,
                    entry.isotope,
                    entry.technique,
                    entry.film_speed,
                    entry.material,
                    entry.thickness_min_mm,
                    entry.thickness_max_mm,
                    entry.base_constant,
                    entry.alpha,
                    entry.remarks.as_deref().unwrap_or("")
                );
            }
        }
        ChartAction::Add(row) => {
            let material = match row.material {
                Some(material) => material,
                None => env.config()?.defaults.material.clone(),
            };
            let entry = ChartEntry {
                id: Uuid::new_v4(),
                isotope: row.isotope,
                technique: row.technique,
                film_speed: row.film,
                material,
                thickness_min_mm: row.thickness_min,
                thickness_max_mm: row.thickness_max,
                base_constant: row.base_constant,
                alpha: row.alpha,
                remarks: row.remarks.filter(|r| !r.trim().is_empty()),
            };
            let id = entry.id;

            let overlaps = layout.update_chart(|chart| {
                chart.insert(entry);
                Ok(chart.overlaps())
            })?;
            report_overlaps(&overlaps);
            println!("✓ Chart row added");
            println!("Chart row id: {}", id);
        }
        ChartAction::Remove { id } => {
            let removed =
                layout.update_chart(|chart| chart.remove(id).ok_or(Error::ChartEntryNotFound(id)))?;
            println!(
                "✓ Removed chart row {} ({} {} {} {}-{} mm)",
                id,
                removed.isotope,
                removed.technique,
                removed.film_speed,
                removed.thickness_min_mm,
                removed.thickness_max_mm
            );
        }
        ChartAction::Import { path } => {
            let imported = ExposureChart::load_csv(&path)?;
            let errors = imported.validate();
            if !errors.is_empty() {
                eprintln!("Chart validation errors:");
                for error in &errors {
                    eprintln!("  - {}", error);
                }
                return Err(Error::ChartValidation(format!(
                    "{} problem(s) in {}",
                    errors.len(),
                    path.display()
                )));
            }
            let rows = imported.len();
            let overlaps = layout.update_chart(|chart| {
                *chart = imported;
                Ok(chart.overlaps())
            })?;
            report_overlaps(&overlaps);
            println!("✓ Imported {} chart rows", rows);
        }
        ChartAction::Check => {
            let chart = layout.load_chart()?;
            let errors = chart.validate();
            for error in &errors {
                eprintln!("  - {}", error);
            }
            report_overlaps(&chart.overlaps());
            if !errors.is_empty() {
                return Err(Error::ChartValidation(format!("{} problem(s)", errors.len())));
            }
            println!("✓ Chart OK ({} rows)", chart.len());
        }
    }
    Ok(())
}

fn report_overlaps(overlaps: &[(Uuid, Uuid)]) {
    for (a, b) in overlaps {
        println!(
            "Note: rows {} and {} overlap; the narrower band is used where both apply",
            a, b
        );
    }
}

fn cmd_casting(layout: &DataLayout, action: CastingAction) -> Result<()> {
    let registry_path = layout.registry_path();
    match action {
        CastingAction::Open {
            name,
            customer,
            date,
            heat_no,
            rt_no,
            area_coverage,
        } => {
            let casting = Casting {
                id: Uuid::new_v4(),
                date: date.unwrap_or_else(|| Utc::now().date_naive()),
                name,
                heat_no,
                rt_no,
                area_coverage,
                customer,
                status: CastingStatus::Open,
            };
            let id = casting.id;
            Registry::update(&registry_path, |r| r.add_casting(casting))?;

            println!("✓ Casting opened");
            println!("Casting id: {}", id);
        }
        CastingAction::Close { id } => {
            Registry::update(&registry_path, |r| {
                r.set_casting_status(id, CastingStatus::Completed)
            })?;
            println!("✓ Casting {} completed", id);
        }
        CastingAction::Reopen { id } => {
            Registry::update(&registry_path, |r| r.set_casting_status(id, CastingStatus::Open))?;
            println!("✓ Casting {} reopened", id);
        }
        CastingAction::List => {
            let registry = layout.load_registry()?;
            if registry.castings.is_empty() {
                println!("No castings.");
            }
            for casting in registry.castings_sorted() {
                println!(
                    "{}  {}  {:<9}  {}  ({})",
                    casting.id,
                    casting.date,
                    format!("{:?}", casting.status).to_lowercase(),
                    casting.name,
                    casting.customer
                );
            }
        }
    }
    Ok(())
}

fn cmd_expose(env: &mut Env, args: ExposeArgs) -> Result<Outcome> {
    let layout = env.layout()?;
    let config = env.config()?;
    let mut repo = FileRepository::open(layout.data_dir())?;

    let request = ExposureRequest {
        source_id: args.source,
        at: args.at.unwrap_or_else(Utc::now),
        technique: args.technique,
        film_speed: args.film,
        material: args
            .material
            .unwrap_or_else(|| config.defaults.material.clone()),
        thickness_mm: args.thickness,
        sfd_mm: args.sfd,
        total_film: args.films,
        setting_time_s: args.setting.unwrap_or(config.overhead.setting_time_s),
        movement_time_s: args.movement.unwrap_or(config.overhead.movement_time_s),
    };

    if args.dry_run {
        return match plan_exposure(&repo, &request)? {
            ExposureOutcome::Computed(plan) => {
                display_plan(&plan);
                println!("\n[Dry run - not recording exposure]");
                Ok(Outcome::Done)
            }
            ExposureOutcome::NoChartMatch { key } => Ok(no_chart_match(&key)),
        };
    }

    let casting_id = args.casting.ok_or_else(|| {
        Error::Validation("--casting is required unless --dry-run is given".into())
    })?;
    let casting = repo.registry().casting(casting_id)?.clone();

    match record_exposure(&mut repo, &casting, &request)? {
        RecordOutcome::Recorded { plan, record } => {
            display_plan(&plan);
            println!("\n✓ Exposure recorded on {}", casting.name);
            println!("Exposure id: {}", record.id);
            Ok(Outcome::Done)
        }
        RecordOutcome::NoChartMatch { key } => Ok(no_chart_match(&key)),
    }
}

fn no_chart_match(key: &ChartKey) -> Outcome {
    eprintln!("No applicable exposure chart entry for {}", key);
    eprintln!("Configure the chart (rtexp chart add / chart import <file.csv>) and try again.");
    Outcome::NoChartMatch
}

fn display_plan(plan: &ExposurePlan) {
    let timing = &plan.timing;
    let entry = &plan.chart_entry;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {} EXPOSURE", plan.isotope);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!(
        "  Chart:       {} {} {} {}-{} mm (K {}, α {})",
        entry.technique,
        entry.film_speed,
        entry.material,
        entry.thickness_min_mm,
        entry.thickness_max_mm,
        entry.base_constant,
        entry.alpha
    );
    println!("  A_eff:       {:.1} MBq", timing.effective_activity_mbq);
    println!("  Total:       {:.3} s", timing.total_seconds);
    println!("  Per film:    {:.3} s", timing.each_seconds);
    println!("  Per casting: {:.2} s", timing.each_with_overhead_seconds);
}

fn cmd_report(layout: &DataLayout, args: ReportArgs) -> Result<()> {
    let registry = layout.load_registry()?;
    let log = layout.read_log()?;
    if !log.skipped_lines.is_empty() {
        let lines: Vec<String> = log.skipped_lines.iter().map(|n| n.to_string()).collect();
        eprintln!(
            "Warning: skipped {} unreadable exposure log line(s): {}",
            lines.len(),
            lines.join(", ")
        );
    }
    let records = log.records;

    let filter = ReportFilter {
        customer: args.customer,
        casting_id: args.casting,
        isotope: args.isotope,
        from: args.from,
        to: args.to,
        status: args.status,
    };
    let rows = filter.apply(&records, &registry);

    if rows.is_empty() {
        println!("No exposures match.");
        return Ok(());
    }

    for row in &rows {
        display_row(row);
    }

    let summary = summarize(&rows);
    println!();
    println!(
        "Totals: {} lines, {} films, exposure {}, per casting {}",
        summary.lines,
        summary.total_films,
        format_seconds(summary.total_exposure_s),
        format_seconds(summary.total_per_casting_s)
    );
    Ok(())
}

fn display_row(row: &ReportRow<'_>) {
    let record = row.record;
    let (casting, customer) = row
        .casting
        .map(|c| (c.name.as_str(), c.customer.as_str()))
        .unwrap_or(("?", "?"));
    println!(
        "{}  {:<14}  {:<14}  {:<6}  {:<6} {:<4}  {:>6} mm  SFD {:>5} mm  x{:<3}  {:>8}  {:>8}",
        record.recorded_at.date_naive(),
        casting,
        customer,
        record.isotope,
        record.technique,
        record.film_speed,
        record.thickness_mm,
        record.sfd_mm,
        record.total_film,
        format_seconds(record.total_exposure_s),
        format_seconds(record.per_casting_s)
    );
}
