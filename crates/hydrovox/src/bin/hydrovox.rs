//! Command-line front end: runs a sequence described by a JSON config.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use clap::{Parser, ValueEnum};
use hydrovox::{BackendKind, SequenceConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Sequential,
    Parallel,
    Gpu,
}

#[derive(Debug, Parser)]
#[command(
    name = "hydrovox",
    about = "Voxelize Selafin meshes into volume grids",
    version,
    long_about = None
)]
struct Cli {
    /// JSON sequence config; missing keys take their default
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// override the execution backend
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// worker threads for the parallel backend
    #[arg(long)]
    threads: Option<usize>,

    /// override the output directory
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// first time point (inclusive)
    #[arg(long)]
    start: Option<usize>,

    /// last time point (inclusive)
    #[arg(long)]
    end: Option<usize>,

    /// print the default config as JSON and exit
    #[arg(long, default_value = "false")]
    print_default_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut SequenceConfig) {
        let threads = self.threads.unwrap_or_else(|| match config.backend {
            BackendKind::Parallel { threads } => threads,
            _ => std::thread::available_parallelism().map_or(1, usize::from),
        });
        match self.backend {
            Some(BackendArg::Sequential) => config.backend = BackendKind::Sequential,
            Some(BackendArg::Parallel) => config.backend = BackendKind::Parallel { threads },
            Some(BackendArg::Gpu) => config.backend = BackendKind::Gpu,
            None => {
                if let (BackendKind::Parallel { .. }, Some(threads)) =
                    (config.backend, self.threads)
                {
                    config.backend = BackendKind::Parallel { threads };
                }
            }
        }
        if let Some(output) = &self.output {
            config.output_dir.clone_from(output);
        }
        if let Some(start) = self.start {
            config.start = start;
        }
        if self.end.is_some() {
            config.end = self.end;
        }
    }

    /// `--threads` value that has no effect on the configured backend.
    fn ignored_threads(&self, config: &SequenceConfig) -> Option<usize> {
        match config.backend {
            BackendKind::Parallel { .. } => None,
            _ => self.threads,
        }
    }
}

fn run(cli: &Cli) -> hydrovox::Result<()> {
    if cli.print_default_config {
        println!("{}", SequenceConfig::default().to_json()?);
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => SequenceConfig::from_json_file(path)?,
        None => SequenceConfig::default(),
    };
    cli.apply(&mut config);
    if let Some(threads) = cli.ignored_threads(&config) {
        log::warn!(
            "--threads {threads} ignored: backend {} does not use worker threads",
            config.backend
        );
    }
    log::info!("source {}, backend {}", config.source.display(), config.backend);

    let report = hydrovox::run(&config, &AtomicBool::new(false))?;
    log::info!(
        "done: {} frames in {}",
        report.frames.len(),
        config.output_dir.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hydrovox").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_threads_select_parallel_width() {
        let cli = parse(&["--backend", "parallel", "--threads", "3"]);
        let mut config = SequenceConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.backend, BackendKind::Parallel { threads: 3 });
        assert_eq!(cli.ignored_threads(&config), None);
    }

    #[test]
    fn test_threads_without_parallel_backend_are_reported() {
        let cli = parse(&["--backend", "gpu", "--threads", "4"]);
        let mut config = SequenceConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.backend, BackendKind::Gpu);
        assert_eq!(cli.ignored_threads(&config), Some(4));

        let cli = parse(&["--threads", "2"]);
        let mut config = SequenceConfig {
            backend: BackendKind::Sequential,
            ..SequenceConfig::default()
        };
        cli.apply(&mut config);
        assert_eq!(config.backend, BackendKind::Sequential);
        assert_eq!(cli.ignored_threads(&config), Some(2));
    }

    #[test]
    fn test_overrides_range_and_output() {
        let cli = parse(&["--start", "2", "--end", "5", "--output", "out"]);
        let mut config = SequenceConfig::default();
        cli.apply(&mut config);
        assert_eq!((config.start, config.end), (2, Some(5)));
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }
}
