use certgen::batch::{BatchConfig, BatchPipeline, CancelFlag, RowFailurePolicy};
use certgen::dispatch::{DispatchConfig, DispatchPipeline, MinInterval};
use certgen::imaging::Region;
use certgen::mail::{ConsoleMailer, SmtpMailer, SmtpSettings};
use certgen::preview::{DEFAULT_PREVIEW_FONT_SIZE, PreviewRequest, preview_request};
use certgen::{config, output};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "certgen")]
#[command(about = "Generate name certificates from a template and mail them out")]
#[command(long_about = "\
Generate name certificates from a template and mail them out

Each participant's name is written in the largest size (stepping down by 2,
never below 10) that fits the configured region of the template, centered
in it, and saved as generated/certificate_<email>.pdf. The send command
mails each certificate to its participant.

Project structure:

  my-event/
  ├── certgen.toml           # Config (optional; all keys have defaults)
  ├── participants.csv       # Columns: name,email (others ignored)
  ├── template.png           # Certificate background
  ├── font.ttf               # Font for the names
  └── generated/             # Output, one file per participant

Credentials for send come from SENDER_EMAIL and APP_PASSWORD, or [email]
in certgen.toml.

Run 'certgen gen-config' to generate a documented certgen.toml.")]
#[command(version)]
struct Cli {
    /// Config file; relative paths inside it resolve against its directory
    #[arg(long, default_value = "certgen.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one certificate per participant
    Generate {
        /// Render on all cores (bounded by batch.max_processes)
        #[arg(long)]
        parallel: bool,
        /// Record failing rows and keep going instead of stopping
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Email each participant their certificate
    Send {
        /// Build and describe every message without sending
        #[arg(long)]
        dry_run: bool,
        /// Write per-recipient outcomes as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Render a single PNG from explicit files
    Preview {
        #[arg(long)]
        template: PathBuf,
        #[arg(long)]
        font: Option<PathBuf>,
        #[arg(long)]
        text: String,
        /// Target rectangle as X,Y,WIDTH,HEIGHT
        #[arg(long, value_parser = parse_region)]
        region: Region,
        #[arg(long, default_value = "#000000")]
        color: String,
        /// Initial font size
        #[arg(long, default_value_t = DEFAULT_PREVIEW_FONT_SIZE)]
        size: u32,
        #[arg(long, default_value = "preview.png")]
        out: PathBuf,
    },
    /// Validate config, font, template and participants without writing
    Check,
    /// Print a stock certgen.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            parallel,
            continue_on_error,
        } => {
            let cert_config = config::load_config(&cli.config)?;
            let mut batch_config = BatchConfig::from_cert_config(&cert_config);
            batch_config.parallel |= parallel;
            if continue_on_error {
                batch_config.on_error = RowFailurePolicy::Continue;
            }
            if batch_config.parallel {
                init_thread_pool(&cert_config.batch);
            }

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_lines(&output::format_batch_event(&event));
                }
            });
            let cancel = CancelFlag::new();
            cancel_on_interrupt(&cancel)?;
            let result = BatchPipeline::new(batch_config).run(&cancel, Some(tx));
            printer.join().ok();
            let summary = result?;
            output::print_lines(&output::format_batch_summary(&summary));
        }
        Command::Send { dry_run, report } => {
            let cert_config = config::load_config(&cli.config)?;
            let dispatch_config = DispatchConfig::from_cert_config(&cert_config);
            let mut pacer = MinInterval::new(dispatch_config.delay);
            let pipeline = DispatchPipeline::new(dispatch_config);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_lines(&output::format_dispatch_event(&event));
                }
            });
            let cancel = CancelFlag::new();
            cancel_on_interrupt(&cancel)?;
            let result = if dry_run {
                pipeline.run(&ConsoleMailer::stderr(), &mut pacer, &cancel, Some(tx))
            } else {
                let mailer = SmtpMailer::new(SmtpSettings::from(&cert_config.email));
                pipeline.run(&mailer, &mut pacer, &cancel, Some(tx))
            };
            printer.join().ok();
            let dispatch_report = result?;
            output::print_lines(&output::format_dispatch_summary(&dispatch_report));
            if let Some(path) = report {
                dispatch_report.write_json(&path)?;
                println!("Report: {}", path.display());
            }
        }
        Command::Preview {
            template,
            font,
            text,
            region,
            color,
            size,
            out,
        } => {
            let request = PreviewRequest {
                template_url: template.display().to_string(),
                font_url: font.map(|f| f.display().to_string()),
                text,
                bbox_x: region.x,
                bbox_y: region.y,
                bbox_width: region.width,
                bbox_height: region.height,
                text_color: color,
                font_size: size,
            };
            let png = preview_request(&request, |url| {
                std::fs::read(url).map_err(|e| e.to_string())
            })?;
            std::fs::write(&out, png)?;
            println!("Preview \u{2192} {}", out.display());
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let cert_config = config::load_config(&cli.config)?;
            let pipeline = BatchPipeline::new(BatchConfig::from_cert_config(&cert_config));
            let count = pipeline.check()?;
            println!("Font: {}", cert_config.paths.font.display());
            println!("Template: {}", cert_config.paths.template.display());
            println!(
                "Participants: {} ({} rows)",
                cert_config.paths.recipients.display(),
                count
            );
            let dispatch_config = DispatchConfig::from_cert_config(&cert_config);
            match dispatch_config.check_credentials() {
                Ok(()) => println!("Sender: {}", dispatch_config.sender_email),
                Err(e) => println!("Sender: not ready ({})", e),
            }
            println!("==> Ready to generate");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Ctrl-C sets `flag`: the row in flight finishes, no new row starts, and
/// the run still reports (and closes its mail session).
fn cancel_on_interrupt(flag: &CancelFlag) -> Result<(), ctrlc::Error> {
    let flag = flag.clone();
    ctrlc::set_handler(move || flag.cancel())
}

/// Parse `X,Y,WIDTH,HEIGHT` into a region.
fn parse_region(s: &str) -> Result<Region, String> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("region must be X,Y,WIDTH,HEIGHT: {e}"))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(Region::new(*x, *y, *w, *h)),
        _ => Err(format!(
            "region must have 4 values (X,Y,WIDTH,HEIGHT), got {}",
            parts.len()
        )),
    }
}

/// Initialize the rayon thread pool based on batch config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(batch: &config::BatchSettings) {
    let threads = config::effective_threads(batch);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
