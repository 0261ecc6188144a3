//! co2log command-line entry point.
//!
//! # Responsibility
//! - Run one build with the intensity plugin against an output directory.
//! - Inspect persisted intensity logs and the known region table.
//!
//! Persistence failures inside the plugin are logged and do not change the
//! exit status; configuration errors do.

use clap::{Args, Parser, Subcommand};
use co2log_core::{
    init_logging, init_stderr_logging, load_intensity_table, load_options_file, parse_rows,
    AppendOutcome, AverageIntensityTable, BuildPipeline, Co2Plugin, HookOutcome, IntensityLookup,
    LocalFileSystem, OutputFileSystem, PluginOptions, StageOutcome, SystemClock, TextEncoding,
};
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "co2log",
    version,
    about = "Record one carbon-intensity data point per build"
)]
struct Cli {
    /// Log level for stderr diagnostics (trace|debug|info|warn|error|off)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Write rolling log files to this directory instead of stderr
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one build and record its intensity row
    Record(RecordArgs),
    /// Print the rows of a persisted intensity log
    Show(ShowArgs),
    /// List known region codes and their intensities
    Regions(RegionsArgs),
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Build output directory
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// JSON options file; flags below override its fields
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Artifact file name inside the output directory
    #[arg(long)]
    output_file: Option<String>,

    /// Region code, e.g. FIN
    #[arg(long)]
    region: Option<String>,

    /// Text encoding of the persisted log
    #[arg(long)]
    encoding: Option<String>,

    /// Emit a fresh single-row artifact instead of appending
    #[arg(long)]
    emit_fresh: bool,

    /// JSON object of region code to intensity, replacing the built-in table
    #[arg(long, value_name = "FILE")]
    intensity_table: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Persisted intensity log
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Text encoding of the log
    #[arg(long, default_value = "utf-8")]
    encoding: String,
}

#[derive(Args, Debug)]
struct RegionsArgs {
    /// JSON object of region code to intensity, replacing the built-in table
    #[arg(long, value_name = "FILE")]
    intensity_table: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = setup_logging(&cli.log_level, cli.log_dir.as_deref()) {
        eprintln!("co2log: {err}");
        return ExitCode::from(2);
    }

    let result = match cli.command {
        Command::Record(args) => record(args),
        Command::Show(args) => show(args, &mut std::io::stdout().lock()),
        Command::Regions(args) => regions(args, &mut std::io::stdout().lock()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("co2log: {message}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(level: &str, log_dir: Option<&Path>) -> Result<(), String> {
    let Some(dir) = log_dir else {
        return init_stderr_logging(level);
    };
    let dir = absolute_dir(dir)?;
    let dir = dir
        .to_str()
        .ok_or_else(|| format!("log directory `{}` is not valid UTF-8", dir.display()))?;
    init_logging(level, dir)
}

fn absolute_dir(dir: &Path) -> Result<PathBuf, String> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|err| format!("failed to resolve current directory: {err}"))?;
    Ok(cwd.join(dir))
}

fn intensity_lookup(table: Option<&Path>) -> Result<Box<dyn IntensityLookup>, String> {
    match table {
        Some(path) => {
            let table = load_intensity_table(path).map_err(|err| err.to_string())?;
            debug!(
                "event=intensity_table_load module=cli status=ok path={} regions={}",
                path.display(),
                table.len()
            );
            Ok(Box::new(table))
        }
        None => Ok(Box::new(AverageIntensityTable::new())),
    }
}

fn record(args: RecordArgs) -> Result<(), String> {
    let base = match &args.config {
        Some(path) => load_options_file(path).map_err(|err| err.to_string())?,
        None => PluginOptions::default(),
    };
    let overrides = PluginOptions {
        output_file: args.output_file,
        region: args.region,
        encoding: args.encoding,
        emit_one_new_file: args.emit_fresh.then_some(true),
    };
    let options = base.merged_with(overrides);
    debug!("event=cli_record module=cli status=start options={options:?}");

    let lookup = intensity_lookup(args.intensity_table.as_deref())?;
    let plugin = Co2Plugin::new(options, lookup).map_err(|err| err.to_string())?;
    let mut pipeline = BuildPipeline::new(&args.output_dir);
    pipeline
        .register(Box::new(plugin))
        .map_err(|err| err.to_string())?;

    let report = pipeline
        .run_build(&LocalFileSystem, &SystemClock)
        .map_err(|err| err.to_string())?;

    for outcome in report.outcomes_for(co2log_core::plugin::PLUGIN_NAME) {
        match outcome {
            HookOutcome::Staged(StageOutcome::Emitted) => {
                println!("staged new artifact");
            }
            HookOutcome::Staged(StageOutcome::Appended { rows }) => {
                println!("staged artifact now holds {rows} rows");
            }
            HookOutcome::Persisted(AppendOutcome::Created { path }) => {
                println!("created {}", path.display());
            }
            HookOutcome::Persisted(AppendOutcome::Appended { path, prior_rows }) => {
                println!("appended to {} ({} rows)", path.display(), prior_rows + 1);
            }
            HookOutcome::Persisted(AppendOutcome::ReadFailed(err))
            | HookOutcome::Persisted(AppendOutcome::WriteFailed(err)) => {
                eprintln!("co2log: row dropped for this build: {err}");
            }
            HookOutcome::Skipped
            | HookOutcome::Staged(StageOutcome::Skipped)
            | HookOutcome::Persisted(AppendOutcome::Skipped) => {}
        }
    }
    for path in &report.flushed {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn show(args: ShowArgs, out: &mut impl Write) -> Result<(), String> {
    let encoding = TextEncoding::from_label(&args.encoding).map_err(|err| err.to_string())?;
    let content = LocalFileSystem
        .read_file(&args.file, encoding)
        .map_err(|err| err.to_string())?;
    let records = parse_rows(&content).map_err(|err| err.to_string())?;
    for record in &records {
        writeln!(
            out,
            "{:<8} {:>10} {:>16}",
            record.region(),
            co2log_core::model::record::format_intensity(record.intensity()),
            record.timestamp_ms()
        )
        .map_err(|err| err.to_string())?;
    }
    writeln!(out, "{} rows", records.len()).map_err(|err| err.to_string())
}

fn regions(args: RegionsArgs, out: &mut impl Write) -> Result<(), String> {
    let table = intensity_lookup(args.intensity_table.as_deref())?;
    for region in table.regions() {
        if let Some(intensity) = table.resolve_intensity(&region) {
            writeln!(
                out,
                "{region:<8} {}",
                co2log_core::model::record::format_intensity(intensity)
            )
            .map_err(|err| err.to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use std::path::Path;

    fn run_record(output_dir: &Path, extra: &[&str]) -> Result<(), String> {
        let mut argv = vec!["co2log", "record", "--output-dir", output_dir.to_str().unwrap()];
        argv.extend_from_slice(extra);
        let Command::Record(args) = Cli::parse_from(argv).command else {
            panic!("expected record command");
        };
        super::record(args)
    }

    #[test]
    fn parses_record_flags() {
        let cli = Cli::parse_from([
            "co2log",
            "record",
            "--output-dir",
            "dist",
            "--region",
            "FIN",
            "--emit-fresh",
        ]);
        match cli.command {
            Command::Record(args) => {
                assert_eq!(args.output_dir.to_str(), Some("dist"));
                assert_eq!(args.region.as_deref(), Some("FIN"));
                assert!(args.emit_fresh);
                assert!(args.config.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.log_level, "warn");
        assert!(cli.log_dir.is_none());
    }

    #[test]
    fn parses_global_log_dir_after_subcommand() {
        let cli = Cli::parse_from(["co2log", "regions", "--log-dir", "logs"]);
        assert_eq!(cli.log_dir.as_deref(), Some(Path::new("logs")));
        assert!(matches!(cli.command, Command::Regions(_)));
    }

    #[test]
    fn relative_log_dir_is_made_absolute() {
        let dir = super::absolute_dir(Path::new("logs")).unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("logs"));
    }

    #[test]
    fn record_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            run_record(dir.path(), &["--region", "SWE"]).unwrap();
        }
        let content =
            std::fs::read_to_string(dir.path().join("emissions-intensity-data.csv")).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().all(|line| line.starts_with("SWE,45.0,")));
    }

    #[test]
    fn record_rejects_unknown_region() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_record(dir.path(), &["--region", "ATLANTIS"]).unwrap_err();
        assert!(err.contains("ATLANTIS"));
    }

    #[test]
    fn show_reports_rows_written_by_record() {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            run_record(dir.path(), &["--region", "FIN"]).unwrap();
        }
        let log = dir.path().join("emissions-intensity-data.csv");
        let Command::Show(args) = Cli::parse_from(["co2log", "show", log.to_str().unwrap()]).command
        else {
            panic!("expected show command");
        };

        let mut out = Vec::new();
        super::show(args, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[..2].iter().all(|line| line.starts_with("FIN")));
        assert_eq!(lines[2], "2 rows");
    }

    #[test]
    fn show_rejects_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.csv");
        let Command::Show(args) =
            Cli::parse_from(["co2log", "show", missing.to_str().unwrap()]).command
        else {
            panic!("expected show command");
        };
        let mut out = Vec::new();
        assert!(super::show(args, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn regions_lists_builtin_table() {
        let Command::Regions(args) = Cli::parse_from(["co2log", "regions"]).command else {
            panic!("expected regions command");
        };
        let mut out = Vec::new();
        super::regions(args, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|line| line.starts_with("FIN") && line.ends_with("82.0")));
        assert!(text.lines().any(|line| line.starts_with("WORLD")));
    }

    #[test]
    fn record_uses_loaded_intensity_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("intensities.json");
        std::fs::write(&table, r#"{"ALB": 24.0, "DZA": 634.0, "AGO": 174.0}"#).unwrap();
        let out_dir = dir.path().join("dist");

        run_record(
            &out_dir,
            &["--region", "ALB", "--intensity-table", table.to_str().unwrap()],
        )
        .unwrap();

        let content = std::fs::read_to_string(out_dir.join("emissions-intensity-data.csv")).unwrap();
        assert!(content.starts_with("ALB,24.0,"));
    }

    #[test]
    fn regions_lists_loaded_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("intensities.json");
        std::fs::write(&table, r#"{"DZA": 634.0, "AGO": 174.0}"#).unwrap();
        let Command::Regions(args) = Cli::parse_from([
            "co2log",
            "regions",
            "--intensity-table",
            table.to_str().unwrap(),
        ])
        .command
        else {
            panic!("expected regions command");
        };
        let mut out = Vec::new();
        super::regions(args, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "AGO      174.0\nDZA      634.0\n");
    }
}
