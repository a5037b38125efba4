//! Maintenance CLI for the ibus-libpinyin backend.
//!
//! Usage:
//!   ibus-libpinyin-tool paths
//!   ibus-libpinyin-tool config --file ~/.config/ibus-libpinyin.toml --write
//!   ibus-libpinyin-tool learn --family pinyin --data-dir data 你好 中国
//!   ibus-libpinyin-tool export --family pinyin --format csv --sort-by-freq

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ibus_libpinyin_core::{
    BackendConfig, BackendSlot, ConversionBackend, Family, StoragePaths, SystemClock, TimerQueue,
    UserDict, UserDictEngine, USERDICT_FILE,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ibus-libpinyin-tool")]
#[command(about = "Inspect and maintain ibus-libpinyin user data")]
struct Args {
    /// Home directory to resolve user data under (defaults to $HOME)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// System data directory (defaults to the libpinyin install path)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the data directory and the per-family user directories
    Paths,
    /// Print the effective configuration, or write the defaults
    Config {
        /// Configuration file to read (or write with --write)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Write the default configuration to --file
        #[arg(long, requires = "file")]
        write: bool,
    },
    /// Learn phrases through a backend session and save them
    Learn {
        #[arg(short, long)]
        family: Family,
        /// Configuration file applied to the context
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(required = true)]
        phrases: Vec<String>,
    },
    /// Export a family's user dictionary
    Export {
        #[arg(short, long)]
        family: Family,
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Sort by frequency (descending)
        #[arg(long)]
        sort_by_freq: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Csv,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let paths = storage_paths(args.home.as_deref(), args.data_dir.as_deref());

    match args.command {
        Command::Paths => print_paths(&paths),
        Command::Config { file, write } => config(file.as_deref(), write)?,
        Command::Learn {
            family,
            config,
            phrases,
        } => learn(paths, family, config.as_deref(), &phrases)?,
        Command::Export {
            family,
            format,
            output,
            sort_by_freq,
        } => export(&paths, family, format, output.as_deref(), sort_by_freq)?,
    }
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_env("IBUS_LIBPINYIN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn storage_paths(home: Option<&Path>, data_dir: Option<&Path>) -> StoragePaths {
    let paths = match home {
        Some(home) => StoragePaths::with_home(home),
        None => StoragePaths::from_env(),
    };
    match data_dir {
        Some(dir) => paths.with_data_dir(dir),
        None => paths,
    }
}

fn print_paths(paths: &StoragePaths) {
    println!("data: {}", paths.data_dir().display());
    for family in Family::ALL {
        match paths.user_dir(family) {
            Some(dir) => println!("{}: {}", family, dir.display()),
            None => println!("{}: (no user directory)", family),
        }
    }
}

fn config(file: Option<&Path>, write: bool) -> Result<()> {
    if write {
        let Some(path) = file else {
            bail!("--write needs --file");
        };
        BackendConfig::default()
            .save_toml(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = match file {
        Some(path) => BackendConfig::load_toml(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => BackendConfig::default(),
    };
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn learn(
    paths: StoragePaths,
    family: Family,
    config: Option<&Path>,
    phrases: &[String],
) -> Result<()> {
    let config = match config {
        Some(path) => BackendConfig::load_toml(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => BackendConfig::default(),
    };

    let mut slot = BackendSlot::new();
    let backend = slot.init(ConversionBackend::new(
        UserDictEngine::new(),
        config,
        paths,
        TimerQueue::new(SystemClock),
        SystemClock,
    ))?;

    let instance = backend.alloc_instance(family)?;
    for phrase in phrases {
        instance.learn(phrase);
        backend.modified();
    }
    info!(%family, count = phrases.len(), "learned phrases");
    let store = backend.user_dir(family).map(|dir| dir.join(USERDICT_FILE));
    backend.free_instance(family, instance);

    // Tearing the backend down forces the pending save.
    slot.finalize()?;
    match store {
        Some(path) => println!("Saved {} phrase(s) to {}", phrases.len(), path.display()),
        None => println!("No user directory available; nothing was persisted"),
    }
    Ok(())
}

fn export(
    paths: &StoragePaths,
    family: Family,
    format: Format,
    output: Option<&Path>,
    sort_by_freq: bool,
) -> Result<()> {
    let Some(dir) = paths.user_dir(family) else {
        bail!("no home directory; cannot locate the {} user dictionary", family);
    };
    let db = dir.join(USERDICT_FILE);
    if !db.exists() {
        bail!("no user dictionary at {}", db.display());
    }

    let userdict = UserDict::open(&db)
        .map_err(|e| anyhow::anyhow!("Failed to open user dict {}: {}", db.display(), e))?;
    let mut entries = userdict.entries();
    if sort_by_freq {
        entries.sort_by(|a, b| b.1.cmp(&a.1));
    }

    let rendered = match format {
        Format::Json => serde_json::to_string_pretty(&entries)?,
        Format::Csv => export_csv(&entries),
    };

    match output {
        Some(path) => std::fs::write(path, rendered)?,
        None => println!("{}", rendered),
    }
    Ok(())
}

fn export_csv(entries: &[(String, u64)]) -> String {
    let mut output = String::from("phrase,frequency\n");
    for (phrase, freq) in entries {
        let escaped = phrase.replace('"', "\"\"");
        output.push_str(&format!("\"{}\",{}\n", escaped, freq));
    }
    output
}
