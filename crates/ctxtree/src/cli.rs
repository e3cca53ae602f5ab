//! Command-line front end.

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::app::document::{DocumentGenerator, DocumentOptions, FsContentProvider};
use crate::app::export::{ExportOptions, Exporter};
use crate::app::pattern::PatternMatcher;
use crate::app::scan::{Scanner, ScannerConfig};
use crate::app::selection::SelectionEngine;
use crate::infra::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "ctxtree",
    author,
    version,
    about = "Select project files with globs and bundle them into one context document"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render the selected files into a context document
    Generate(GenerateArgs),
    /// Print the selection tree
    Tree(TreeArgs),
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct SelectionArgs {
    /// Project root, defaults to the current directory
    pub root: Option<PathBuf>,

    /// Include glob (repeatable, brace groups allowed); replaces configured includes
    #[arg(short, long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Exclude glob (repeatable, brace groups allowed); replaces configured excludes
    #[arg(short, long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Toggle a file or directory after the default selection is applied (repeatable)
    #[arg(short, long = "toggle", value_name = "PATH")]
    pub toggle: Vec<String>,

    /// Start from every file selected instead of the pattern selection
    #[arg(long, conflicts_with = "none")]
    pub all: bool,

    /// Start from nothing selected instead of the pattern selection
    #[arg(long)]
    pub none: bool,

    /// Match globs case-insensitively
    #[arg(long)]
    pub ignore_case: bool,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Write the document to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Copy the document to the clipboard
    #[arg(long)]
    pub copy: bool,

    /// Emit file contents without code fences
    #[arg(long)]
    pub no_fence: bool,
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[arg(long, value_enum, default_value_t = TreeFormat::Text)]
    pub format: TreeFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TreeFormat {
    /// Indented tree with [x] / [ ] / [~] markers
    #[default]
    Text,
    /// Nested JSON
    Json,
}

/// Execute a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate(args) => generate(args),
        Commands::Tree(args) => tree(args),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "ctxtree", &mut io::stdout());
            Ok(())
        }
    }
}

struct Session {
    config: Config,
    engine: SelectionEngine,
    root: Option<PathBuf>,
}

fn prepare(args: &SelectionArgs) -> Result<Session> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => env::current_dir().context("failed to resolve current directory")?,
    };

    let mut config = Config::load(&root)?;
    if !args.include.is_empty() {
        config.patterns.set_include(args.include.clone());
    }
    if !args.exclude.is_empty() {
        config.patterns.set_exclude(args.exclude.clone());
    }
    if args.ignore_case {
        config.patterns.set_case_sensitive(false);
    }

    let matcher =
        PatternMatcher::from_config(&config.patterns).context("invalid include/exclude pattern")?;

    let scanner_cfg = ScannerConfig::from_root(root, &config);
    let scan = Scanner::new().find_all_paths(&scanner_cfg)?;

    let mut engine = SelectionEngine::new(matcher);
    engine.rebuild_classified(scan.entries);

    if args.all {
        engine.select_all();
    } else if args.none {
        engine.select_none();
    }

    for path in &args.toggle {
        if engine.toggle_path(path).is_none() {
            bail!("path not found in project tree: {path}");
        }
    }

    Ok(Session {
        config,
        engine,
        root: scan.root,
    })
}

fn generate(args: GenerateArgs) -> Result<()> {
    let session = prepare(&args.selection)?;
    let selected = session.engine.selected_files();

    let provider = FsContentProvider::new(session.root)
        .with_max_file_size(session.config.scan.max_file_size());
    let mut options = DocumentOptions::from_config(&session.config);
    if args.no_fence {
        options.fence_code = false;
    }
    let document = DocumentGenerator::new(options).generate_report(&selected, &provider);

    if args.output.is_none() && !args.copy {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(document.text.as_bytes())
            .context("failed to write document to stdout")?;
        return stdout.flush().context("failed to flush stdout");
    }

    let export = ExportOptions {
        output_path: args.output,
        copy_to_clipboard: args.copy,
    };
    let result = Exporter::new().export(&document, &export)?;
    tracing::info!(
        files = document.files,
        unreadable = document.unreadable.len(),
        bytes = result.bytes,
        "export complete"
    );
    Ok(())
}

fn tree(args: TreeArgs) -> Result<()> {
    let session = prepare(&args.selection)?;
    let rendered = match args.format {
        TreeFormat::Text => render_tree(&session.engine),
        TreeFormat::Json => {
            let mut json = serde_json::to_string_pretty(&session.engine.view())
                .context("failed to serialize selection tree")?;
            json.push('\n');
            json
        }
    };

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .context("failed to write tree to stdout")?;
    stdout.flush().context("failed to flush stdout")
}

/// Indented text rendering of the selection tree with check markers.
pub fn render_tree(engine: &SelectionEngine) -> String {
    let tree = engine.tree();
    let mut out = String::new();
    for id in tree.iter_depth_first() {
        let (Some(node), Some(state)) = (tree.node(id), engine.check_state(id)) else {
            continue;
        };
        out.push_str(&"  ".repeat(tree.depth(id)));
        out.push_str(state.marker());
        out.push(' ');
        out.push_str(node.name());
        if node.is_dir() {
            out.push('/');
        }
        out.push('\n');
    }
    out
}
