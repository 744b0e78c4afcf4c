// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, warn};
use std::fs::File;
use std::io::BufReader;
use std::io::Write;
use std::path::{Path, PathBuf};

use docxlate::app_config::{self, Config, InjectionPolicy};
use docxlate::app_controller::Controller;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate documents (default command)
    Translate {
        /// Input .docx file or directory to process
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        #[command(flatten)]
        options: TranslateOptions,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Extract segments into a fresh checkpoint without translating
    Extract {
        /// Input .docx file
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Write the translated document from an existing checkpoint
    Inject {
        /// Input .docx file
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Keep the source text where a translation is missing
        #[arg(long)]
        allow_partial: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Show checkpoint progress for a document
    Status {
        /// Input .docx file
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate shell completions for docxlate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by every document command
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Directory receiving checkpoints and translated documents
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'vi', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// Options of the translate command
#[derive(Args, Debug, Clone)]
struct TranslateOptions {
    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the chat-completions endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat-completions base URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Character budget of one chunk
    #[arg(long)]
    max_chunk_size: Option<usize>,

    /// Chunks translated at once
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Write the output even if some segments failed, keeping their source text
    #[arg(long)]
    allow_partial: bool,
}

/// docxlate - resumable AI translation of Word documents
#[derive(Parser, Debug)]
#[command(name = "docxlate")]
#[command(version)]
#[command(about = "AI-powered, resumable translation of .docx documents")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "docxlate extracts the text of a .docx document into a checkpoint, translates it \
in chunks with an OpenAI-compatible model and writes a translated copy with the original layout.

EXAMPLES:
    docxlate report.docx                          # Translate using default config
    docxlate -s en -t fr report.docx              # Translate from English to French
    docxlate --max-concurrent 4 report.docx       # Limit parallel requests
    docxlate -o out /documents/                   # Translate a whole directory
    docxlate extract report.docx                  # Only build the checkpoint
    docxlate inject --allow-partial report.docx   # Write output from the checkpoint
    docxlate status report.docx                   # Show checkpoint progress
    docxlate completions bash > docxlate.bash     # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the config file doesn't
    exist, a default one is created automatically. The API key can also be given
    with --api-key or the OPENAI_API_KEY environment variable.

RESUMING:
    An interrupted or partially failed run leaves <name>_checkpoint.json in the
    output directory. Running the same command again translates only what is left.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input .docx file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    #[command(flatten)]
    options: TranslateOptions,

    #[command(flatten)]
    common: CommonArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the effective level is the global max level,
    // which starts at info and is updated after loading the config
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "docxlate", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate {
            input_path,
            options,
            common,
        }) => run_translate(input_path, options, common).await,
        Some(Commands::Extract { input_file, common }) => {
            let config = load_config(&common)?;
            Controller::with_config(config).extract(&input_file)?;
            Ok(())
        }
        Some(Commands::Inject {
            input_file,
            allow_partial,
            common,
        }) => {
            let mut config = load_config(&common)?;
            if allow_partial {
                config.injection = InjectionPolicy::BestEffort;
            }
            Controller::with_config(config).inject(&input_file)?;
            Ok(())
        }
        Some(Commands::Status { input_file, common }) => {
            let config = load_config(&common)?;
            let progress = Controller::with_config(config).status(&input_file)?;
            println!("{}", progress);
            Ok(())
        }
        None => {
            // Default behavior - translate with the top-level args
            let input_path = cli.input_path.ok_or_else(|| {
                anyhow!("INPUT_PATH is required when no subcommand is specified")
            })?;
            run_translate(input_path, cli.options, cli.common).await
        }
    }
}

async fn run_translate(input_path: PathBuf, options: TranslateOptions, common: CommonArgs) -> Result<()> {
    let mut config = load_config(&common)?;

    // Override config with CLI options if provided
    if let Some(model) = &options.model {
        config.translation.model = model.clone();
    }
    if let Some(api_key) = &options.api_key {
        config.translation.api_key = api_key.clone();
    }
    if let Some(endpoint) = &options.endpoint {
        config.translation.endpoint = endpoint.clone();
    }
    if let Some(max_chunk_size) = options.max_chunk_size {
        config.translation.max_chunk_size = max_chunk_size;
    }
    if let Some(max_concurrent) = options.max_concurrent {
        config.translation.max_concurrent = max_concurrent;
    }
    if options.allow_partial {
        config.injection = InjectionPolicy::BestEffort;
    }

    // Validate the configuration after loading and overriding
    config.validate().context("Configuration validation failed")?;

    let controller = Controller::with_config(config);
    if input_path.is_file() {
        controller.run(input_path, options.force_overwrite).await?;
    } else if input_path.is_dir() {
        controller.run_folder(input_path, options.force_overwrite).await?;
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", input_path));
    }

    Ok(())
}

/// Load the config file, creating a default one if missing, then apply the shared overrides
fn load_config(common: &CommonArgs) -> Result<Config> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &common.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let config_path = &common.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(output_dir) = &common.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(source_lang) = &common.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &common.target_language {
        config.target_language = target_lang.clone();
    }

    match &common.log_level {
        Some(log_level) => config.log_level = log_level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    debug!(
        "Using {} ({} -> {}), output in {:?}",
        config_path, config.source_language, config.target_language, config.output_dir
    );
    Ok(config)
}
