use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use crossbeam_channel::bounded;
use env_logger::Builder;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};

use orgdedupe::config::subsystems::{LinkagePolicy, ParallelBackend};
use orgdedupe::{
    CancellationToken, DedupeConfig, DedupePipeline, Error, PipelineOutput, ProgressEvent, Record,
};

/// Configuration for one dedupe run
struct JobConfig {
    /// Path to the normalized records CSV
    input_file: Option<PathBuf>,
    /// Directory receiving pairs, clusters, primaries and previews
    output_dir: PathBuf,
    /// Override for the clustering linkage policy
    policy: Option<String>,
    /// Override for the clustering similarity threshold
    threshold: Option<f64>,
    /// Override for the worker count (0 = auto)
    workers: Option<usize>,
    /// Force sequential execution
    sequential: bool,
    /// Path to configuration file
    config_file: Option<String>,
}

impl JobConfig {
    /// Parse command line arguments into configuration
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();

        let mut config = JobConfig {
            input_file: None,
            output_dir: PathBuf::from("output"),
            policy: None,
            threshold: None,
            workers: None,
            sequential: false,
            config_file: None,
        };

        let mut i = 1; // Skip program name
        while i < args.len() {
            match args[i].as_str() {
                "--input" => {
                    if i + 1 < args.len() {
                        config.input_file = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--output-dir" => {
                    if i + 1 < args.len() {
                        config.output_dir = PathBuf::from(&args[i + 1]);
                        i += 1;
                    }
                }
                "--policy" => {
                    if i + 1 < args.len() {
                        config.policy = Some(args[i + 1].to_lowercase());
                        i += 1;
                    }
                }
                "--threshold" => {
                    if i + 1 < args.len() {
                        config.threshold = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--workers" => {
                    if i + 1 < args.len() {
                        config.workers = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--sequential" => {
                    config.sequential = true;
                }
                arg if arg.ends_with(".ini") => {
                    config.config_file = Some(arg.to_string());
                }
                _ => {
                    // Unrecognized argument, just ignore
                }
            }
            i += 1;
        }

        config
    }

    /// Print help information about command line options
    fn print_help() {
        println!("OrgDedupe Duplicate Finder - Command Line Options:");
        println!("  --input <path>           Normalized records CSV to deduplicate (required)");
        println!("  --output-dir <path>      Directory for result files (default: output)");
        println!("  --policy <name>          Linkage policy: complete or single");
        println!("  --threshold <value>      Clustering similarity threshold in [0.0, 1.0]");
        println!("  --workers <n>            Worker threads; 0 picks automatically");
        println!("  --sequential             Disable the thread pool entirely");
        println!("  <file.ini>               Use specified INI file for configuration");
        println!();
    }

    /// Validate the configuration for consistency
    /// Returns an error if the configuration is invalid
    fn validate(&self) -> Result<(), String> {
        let input = match &self.input_file {
            Some(path) => path,
            None => return Err("No input file given; use --input <path>".to_string()),
        };
        if !input.exists() {
            return Err(format!("Specified input file does not exist: {:?}", input));
        }

        if let Some(config_path) = &self.config_file {
            let path = Path::new(config_path);
            if !path.exists() {
                return Err(format!("Specified config file does not exist: {}", config_path));
            }
        }

        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(format!(
                    "Threshold must be within [0.0, 1.0], got {}",
                    threshold
                ));
            }
        }

        if let Some(policy) = &self.policy {
            if LinkagePolicy::from_str(policy).is_none() {
                return Err(format!(
                    "Unknown policy '{}'; expected 'complete' or 'single'",
                    policy
                ));
            }
        }

        if self.sequential && self.workers.map_or(false, |w| w > 1) {
            println!("Warning: --workers has no effect together with --sequential");
        }

        Ok(())
    }

    /// Fold the command line overrides into the loaded configuration.
    fn apply_overrides(&self, config: &mut DedupeConfig) {
        if let Some(policy) = self.policy.as_deref().and_then(LinkagePolicy::from_str) {
            config.clustering.policy = policy;
        }
        if let Some(threshold) = self.threshold {
            config.clustering.threshold = threshold;
        }
        if let Some(workers) = self.workers {
            config.executor.worker_count = workers;
        }
        if self.sequential {
            config.executor.backend = ParallelBackend::Sequential;
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Reads normalized records from CSV. `id`, `name_core` and
/// `suffix_class` are required columns; `relationship` and
/// `created_date` are read when present and every other column becomes
/// a pass-through attribute.
fn read_records(path: &Path) -> orgdedupe::Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let position = |name: &str| headers.iter().position(|h| h == name);
    let id_idx = position("id")
        .ok_or_else(|| Error::input("input is missing required column: id"))?;
    let name_idx = position("name_core")
        .ok_or_else(|| Error::input("input is missing required column: name_core"))?;
    let suffix_idx = position("suffix_class")
        .ok_or_else(|| Error::input("input is missing required column: suffix_class"))?;
    let relationship_idx = position("relationship");
    let created_idx = position("created_date");

    let mut records = Vec::new();
    for (row_num, row) in reader.records().enumerate() {
        let row = row?;
        // Data rows start on line 2, after the header.
        let line = row_num + 2;

        let id = row.get(id_idx).unwrap_or("").trim();
        if id.is_empty() {
            return Err(Error::input(format!("line {}: empty record id", line)));
        }
        let name_core = row.get(name_idx).unwrap_or("").trim();
        if name_core.is_empty() {
            return Err(Error::input(format!(
                "line {}: empty name_core for record {}",
                line, id
            )));
        }
        let suffix_class = match row.get(suffix_idx).unwrap_or("").trim() {
            "" => "NONE",
            suffix => suffix,
        };

        let mut record = Record::new(id, name_core, suffix_class);

        if let Some(idx) = relationship_idx {
            let value = row.get(idx).unwrap_or("").trim();
            if !value.is_empty() {
                record.relationship = Some(value.to_string());
            }
        }
        if let Some(idx) = created_idx {
            let value = row.get(idx).unwrap_or("").trim();
            if !value.is_empty() {
                let parsed = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
                    Error::input(format!(
                        "line {}: invalid created_date '{}': {}",
                        line, value, e
                    ))
                })?;
                record.created_date = Some(parsed);
            }
        }

        for (col, header) in headers.iter().enumerate() {
            if col == id_idx
                || col == name_idx
                || col == suffix_idx
                || Some(col) == relationship_idx
                || Some(col) == created_idx
            {
                continue;
            }
            if let Some(value) = row.get(col) {
                let value = value.trim();
                if !value.is_empty() {
                    record.attributes.insert(header.to_string(), value.to_string());
                }
            }
        }

        records.push(record);
    }

    Ok(records)
}

fn write_pairs_csv(path: &Path, pairs: &[orgdedupe::ScoredPair]) -> orgdedupe::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for pair in pairs {
        writer.serialize(pair)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_primaries_csv(
    path: &Path,
    records: &[Record],
    output: &PipelineOutput,
) -> orgdedupe::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["id", "group_id", "is_primary"])?;
    for (idx, record) in records.iter().enumerate() {
        let group = output.group_ids[idx].to_string();
        let primary = output.primary_flags[idx].to_string();
        writer.write_record([record.id.as_str(), group.as_str(), primary.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> orgdedupe::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments into config
    let job_config = JobConfig::from_args();

    // Print help if --help was specified
    if std::env::args().any(|arg| arg == "--help" || arg == "-h") {
        JobConfig::print_help();
        return Ok(());
    }

    // Validate the configuration
    if let Err(error) = job_config.validate() {
        eprintln!("Configuration error: {}", error);
        eprintln!("Use --help to see available options.");
        return Err(error.into());
    }

    // Load configuration using found path or default
    let mut config = if let Some(config_path) = &job_config.config_file {
        DedupeConfig::from_ini(config_path)?
    } else if Path::new("default.ini").exists() {
        DedupeConfig::from_ini("default.ini")?
    } else {
        DedupeConfig::default()
    };
    job_config.apply_overrides(&mut config);
    config.validate()?;

    // Set up logging with minimal configuration
    let timestamp = chrono::Local::now().format("%m_%d_%H_%M");
    fs::create_dir_all("logs")?;
    let log_file = File::create(format!("logs/dedupe_{}.log", timestamp))?;
    let log_level = config.get_log_level();

    // Use a simpler configuration to avoid formatting issues
    Builder::new()
        .filter(None, log_level)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    if log_level != LevelFilter::Off {
        info!("Starting duplicate finding with log level: {:?}", log_level);
    }

    // The input path was checked by validate().
    let input_file = job_config
        .input_file
        .clone()
        .ok_or("No input file given")?;
    let start_time = Instant::now();

    println!("Reading records from {:?}", input_file);
    let records = read_records(&input_file)?;
    info!("Read {} record(s) from {:?}", records.len(), input_file);
    println!("Read {} records", records.len());

    // Cooperative shutdown on Ctrl-C; the second signal kills the process.
    let token = CancellationToken::new();
    let ctrlc_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancellation requested, finishing current work...");
        ctrlc_token.cancel();
    })?;

    let (sender, receiver) = bounded::<ProgressEvent>(64);
    let pipeline = DedupePipeline::new(&config)?.with_progress(sender);

    let multi = MultiProgress::new();
    let overall = multi.add(ProgressBar::new(4));
    overall.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] Stages: [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .unwrap(),
    );
    let status = multi.add(ProgressBar::new_spinner());
    status.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.yellow} {msg}")
            .unwrap(),
    );

    // Drive the pipeline on this thread while a scoped helper thread
    // turns progress events into bar updates. Dropping the pipeline
    // closes the channel and ends the helper.
    let run_result = crossbeam_utils::thread::scope(|s| {
        let consumer = s.spawn(|_| {
            for event in receiver.iter() {
                match event {
                    ProgressEvent::StageStarted { stage } => {
                        status.set_message(format!("{} running...", stage));
                    }
                    ProgressEvent::StageAdvanced {
                        stage,
                        completed,
                        total,
                    } => {
                        status.set_message(format!("{} {}/{}", stage, completed, total));
                    }
                    ProgressEvent::StageFinished { stage, items } => {
                        overall.inc(1);
                        status.set_message(format!("{} done ({} items)", stage, items));
                    }
                    ProgressEvent::Cancelled { stage } => {
                        status.set_message(format!("cancelled during {}", stage));
                    }
                }
            }
        });

        let result = pipeline.run(&records, &token);
        drop(pipeline);
        let _ = consumer.join();
        result
    })
    .map_err(|_| "progress display thread panicked")?;
    let output = run_result?;

    if output.cancelled {
        overall.abandon_with_message("cancelled");
    } else {
        overall.finish_with_message("done");
    }
    status.finish_and_clear();

    // Write result files
    fs::create_dir_all(&job_config.output_dir)?;
    write_pairs_csv(&job_config.output_dir.join("pairs.csv"), &output.scored_pairs)?;
    write_json(
        &job_config.output_dir.join("clusters.json"),
        &*output.clustering,
    )?;
    write_primaries_csv(
        &job_config.output_dir.join("primaries.csv"),
        &records,
        &output,
    )?;
    write_json(&job_config.output_dir.join("previews.json"), &output.previews)?;

    if output.block_stats.truncated {
        warn!("Candidate generation hit the global pair ceiling; results cover a truncated pair set");
        println!("Warning: candidate generation was truncated by the pair ceiling");
    }

    println!("\nDeduplication Summary");
    println!("{}", "-".repeat(60));
    println!("  Records:          {}", records.len());
    println!("  Candidate pairs:  {}", output.block_stats.emitted_pairs);
    println!("  Pairs kept:       {}", output.scored_pairs.len());
    println!("  Clusters:         {}", output.clustering.clusters.len());
    println!("  Outliers:         {}", output.clustering.outliers.len());
    println!("  Primaries:        {}", output.primary_count());
    println!("  Merge previews:   {}", output.previews.len());
    println!("  Duration:         {}", format_duration(start_time.elapsed()));
    println!("  Output directory: {:?}", job_config.output_dir);
    if output.cancelled {
        println!("\nRun was cancelled; the files above hold partial results.");
    }

    info!(
        "Run complete in {}: {} records, {} clusters",
        format_duration(start_time.elapsed()),
        records.len(),
        output.clustering.clusters.len()
    );

    Ok(())
}
