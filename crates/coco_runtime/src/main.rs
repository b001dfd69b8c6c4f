//! Coco Runtime
//!
//! Minimal binary that boots a script directory and opens the console

mod console;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use coco_script::ScriptRuntime;
use coco_services::{ConsoleSettings, Settings};
use tracing_subscriber::EnvFilter;

use crate::console::{Console, InputStatus};

#[derive(Parser, Debug)]
#[command(name = "coco", version, about = "Script host with a memoized module loader")]
struct Cli {
    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory searched for scripts; may be repeated. Replaces the configured paths.
    #[arg(short = 'I', long = "script-dir")]
    script_dirs: Vec<PathBuf>,

    /// Log filter, e.g. `debug` or `coco_script=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Exit after loading instead of opening the console
    #[arg(long)]
    no_console: bool,

    /// Scripts to load after the bootstrap entries
    entries: Vec<String>,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if !self.script_dirs.is_empty() {
            settings.script.search_paths = self.script_dirs.clone();
        }
        if self.no_console {
            settings.console.enabled = false;
        }
        Ok(settings)
    }
}

fn init_tracing(cli_level: Option<&str>, configured: &str) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    init_tracing(cli.log_level.as_deref(), &settings.log.level);
    tracing::info!("Coco v{}", coco_script::VERSION);

    let runtime = ScriptRuntime::new(settings.script.clone()).context("starting script runtime")?;
    runtime.bootstrap().context("loading bootstrap scripts")?;
    for entry in &cli.entries {
        runtime
            .require(entry)
            .with_context(|| format!("loading '{entry}'"))?;
    }
    tracing::info!(loaded = runtime.loaded().len(), "scripts loaded");

    if settings.console.enabled {
        run_console(&runtime, &settings.console)?;
    } else {
        for line in runtime.take_messages() {
            println!("{line}");
        }
    }

    Ok(())
}

fn run_console(runtime: &ScriptRuntime, settings: &ConsoleSettings) -> Result<()> {
    let mut console = Console::new(settings.history);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in runtime.take_messages() {
        console.append_message(line.clone());
        writeln!(stdout, "{line}")?;
    }

    loop {
        let prompt = if console.is_pending() { "... " } else { settings.prompt.as_str() };
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            writeln!(stdout)?;
            break;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if let InputStatus::Handled(output) = console.handle_input(runtime, line) {
            for text in output {
                writeln!(stdout, "{text}")?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from(["coco", "-I", "a", "-I", "b", "--no-console", "main"]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.script.search_paths, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert!(!settings.console.enabled);
        assert_eq!(cli.entries, vec!["main"]);
    }

    #[test]
    fn demo_scripts_boot() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
        let mut settings = Settings::load(&root.join("demos/coco.json")).unwrap();
        settings.script.search_paths = settings
            .script
            .search_paths
            .iter()
            .map(|path| root.join(path))
            .collect();

        let runtime = ScriptRuntime::new(settings.script).unwrap();
        runtime.bootstrap().unwrap();
        assert_eq!(runtime.loaded(), vec!["init", "geometry", "main"]);

        let messages = runtime.take_messages();
        assert_eq!(messages[0], r#"center {"x":160,"y":240}"#);
        assert_eq!(messages[1], "contains true");
        assert_eq!(messages[2], "range end 5");
        assert!(messages[3].contains("x=\"3\""), "{}", messages[3]);
    }
}
