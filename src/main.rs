use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use std::time::Instant;
use thumbkit::imaging::{Dimensions, RustBackend};
use thumbkit::pipeline::{MainStep, PipelineConfig, ProcessEvent, plan_variants, process_image};
use thumbkit::{batch, config, output};

fn version_string() -> &'static str {
    let on_tag = env!("THUMBKIT_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("THUMBKIT_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "thumbkit")]
#[command(about = "Resize, compress and crop images into a display variant and a thumbnail")]
#[command(long_about = "\
Resize, compress and crop images into a display variant and a thumbnail

For every input two files are written:

  photo.jpg         display variant: longer side at most 1280px, JPEG q85
  photo-thumb.jpg   thumbnail: shorter side scaled to 500px, center crop 500x400

Accepted inputs: PNG, JPEG, BMP, WEBP, GIF. The display variant of a GIF is
the original file, copied byte-for-byte.

Settings are read from ./thumbkit.toml when present, or from --config.
Run 'thumbkit gen-config' to generate a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./thumbkit.toml if it exists)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce both variants of a single image
    Process {
        input: PathBuf,
        /// Directory the variants are written to (never over the input itself)
        #[arg(long, default_value = "thumbkit-out")]
        out_dir: PathBuf,
        /// Print both variants as base64 data URIs instead of writing files
        #[arg(long)]
        data_uri: bool,
    },
    /// Process every supported image under a directory in parallel
    Batch {
        dir: PathBuf,
        /// Directory the variants are written to (subdirectories are mirrored;
        /// skipped when walking DIR)
        #[arg(long, default_value = "thumbkit-out")]
        out_dir: PathBuf,
        /// Also write per-file results as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show the sizes the pipeline would produce, without touching pixels
    Plan {
        width: u32,
        height: u32,
        /// Plan as a GIF (display variant passed through)
        #[arg(long)]
        gif: bool,
    },
    /// Print a stock thumbkit.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Process {
            input,
            out_dir,
            data_uri,
        } => {
            let (_, pipeline_config) = load_config(cli.config.as_deref())?;
            let started = Instant::now();
            if data_uri {
                print_data_uris(&input, &pipeline_config)?;
            } else {
                println!("{}", input.display());
                let (tx, printer) = spawn_printer();
                let result = batch::process_file(
                    &RustBackend::new(),
                    &input,
                    &out_dir,
                    &pipeline_config,
                    Some(&tx),
                );
                drop(tx);
                join_printer(printer)?;
                output::print_written(&result?);
            }
            println!("Done in {:.2}s", started.elapsed().as_secs_f64());
        }
        Command::Batch {
            dir,
            out_dir,
            report,
        } => {
            let (file_config, pipeline_config) = load_config(cli.config.as_deref())?;
            init_thread_pool(&file_config.processing);
            let started = Instant::now();
            let results =
                batch::process_batch(&RustBackend::new(), &dir, &out_dir, &pipeline_config);
            output::print_batch_summary(&results);
            if let Some(path) = report {
                batch::write_report(&path, &results)?;
            }
            println!("Done in {:.2}s", started.elapsed().as_secs_f64());

            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed > 0 {
                return Err(format!("{} of {} images failed", failed, results.len()).into());
            }
        }
        Command::Plan { width, height, gif } => {
            let (_, pipeline_config) = load_config(cli.config.as_deref())?;
            let main = if gif {
                MainStep::PassThrough
            } else {
                MainStep::ResizeAndCompress
            };
            let original = Dimensions::new(width, height);
            let plan = plan_variants(original, main, &pipeline_config)?;
            output::print_plan(original, &plan);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(
    path: Option<&Path>,
) -> Result<(config::Config, PipelineConfig), config::ConfigError> {
    let file_config = config::load_config(path)?;
    let pipeline_config = PipelineConfig::from_config(&file_config);
    log::debug!("pipeline config: {:?}", pipeline_config);
    Ok((file_config, pipeline_config))
}

/// `RUST_LOG` wins; otherwise `-v` flags pick the level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn spawn_printer() -> (Sender<ProcessEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_process_event(&event);
        }
    });
    (tx, printer)
}

fn join_printer(printer: JoinHandle<()>) -> Result<(), Box<dyn std::error::Error>> {
    printer
        .join()
        .map_err(|_| "progress printer thread panicked".into())
}

fn print_data_uris(
    input: &Path,
    pipeline_config: &PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let blob = std::fs::read(input)?;
    let processed = process_image(&RustBackend::new(), &blob, pipeline_config, None)?;
    println!(
        "{}",
        output::to_data_uri(&processed.main.media_type(), processed.main.bytes())
    );
    println!(
        "{}",
        output::to_data_uri(
            processed.thumbnail.format.media_type(),
            &processed.thumbnail.bytes
        )
    );
    Ok(())
}
