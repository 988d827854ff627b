use clap::{ArgAction, Parser, Subcommand};
use serde_json::{Value, json};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use toolhost_patch::{
    ApplyMode, DirectiveAction, FileDirective, PatchApplier, PatchEnvelope, PatchRoot, parse_patch,
};
use toolhost_search::{SearchBackend, SearchConfig, SearchProvider};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "toolhost")]
#[command(about = "Apply patch envelopes and run web searches from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a patch and apply it under a root directory.
    Apply(ApplyArgs),
    /// Parse a patch and list its directives without touching the filesystem.
    Check(CheckArgs),
    /// Run a web search through the configured backend.
    Search(SearchArgs),
    /// Fetch a page and print its body.
    Fetch(FetchArgs),
}

#[derive(clap::Args, Debug)]
struct PatchSource {
    #[arg(long, conflicts_with = "patch")]
    patch_file: Option<PathBuf>,
    #[arg(long)]
    patch: Option<String>,
}

#[derive(clap::Args, Debug)]
struct ApplyArgs {
    #[arg(long)]
    root: PathBuf,
    #[command(flatten)]
    source: PatchSource,
    #[arg(long, action = ArgAction::SetTrue)]
    transactional: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    source: PatchSource,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    #[arg(long)]
    query: String,
    #[arg(long, default_value_t = 5)]
    top_n: usize,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    #[arg(long)]
    url: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Exit code 2 is reserved for failed directives, so usage errors exit 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return if error.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let result = match cli.command {
        Commands::Apply(args) => apply_command(args),
        Commands::Check(args) => check_command(args),
        Commands::Search(args) => search_command(args).await,
        Commands::Fetch(args) => fetch_command(args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn apply_command(args: ApplyArgs) -> Result<ExitCode, String> {
    let envelope = load_envelope(&args.source)?;
    let root = PatchRoot::new(&args.root)
        .map_err(|error| format!("invalid root '{}': {error}", args.root.display()))?;
    let mode = if args.transactional {
        ApplyMode::Transactional
    } else {
        ApplyMode::PerDirective
    };

    tracing::debug!(
        root = %root.path().display(),
        ?mode,
        directives = envelope.len(),
        "applying patch"
    );
    let report = PatchApplier::new(root).with_mode(mode).apply(envelope);
    if args.json {
        print_json(&report.to_json())?;
    } else {
        println!("{}", report.summary());
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

fn check_command(args: CheckArgs) -> Result<ExitCode, String> {
    let envelope = load_envelope(&args.source)?;
    if args.json {
        let directives: Vec<Value> = envelope.directives.iter().map(directive_json).collect();
        print_json(&json!({ "directives": directives }))?;
    } else {
        println!("Patch is valid ({} directives):", envelope.len());
        for directive in &envelope.directives {
            println!("{}", describe_directive(directive));
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn search_command(args: SearchArgs) -> Result<ExitCode, String> {
    let backend = load_backend()?;
    let results = backend
        .search(&args.query, args.top_n)
        .await
        .map_err(|error| error.to_string())?;
    if args.json {
        let value = serde_json::to_value(&results).map_err(|error| error.to_string())?;
        print_json(&value)?;
    } else {
        print!("{}", results.render_markdown());
    }
    Ok(ExitCode::SUCCESS)
}

async fn fetch_command(args: FetchArgs) -> Result<ExitCode, String> {
    let backend = load_backend()?;
    let page = backend
        .fetch(&args.url)
        .await
        .map_err(|error| error.to_string())?;
    print!("{}", page.text);
    Ok(ExitCode::SUCCESS)
}

fn load_backend() -> Result<SearchBackend, String> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let config = SearchConfig::from_env().map_err(|error| error.to_string())?;
    SearchBackend::from_config(&config).map_err(|error| error.to_string())
}

fn load_envelope(source: &PatchSource) -> Result<PatchEnvelope, String> {
    let text = match (&source.patch_file, &source.patch) {
        (Some(path), _) => std::fs::read_to_string(path)
            .map_err(|error| format!("failed to read patch file '{}': {error}", path.display()))?,
        (None, Some(text)) => text.clone(),
        (None, None) => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|error| format!("failed to read patch from stdin: {error}"))?;
            buffer
        }
    };
    parse_patch(&text).map_err(|error| error.to_string())
}

fn describe_directive(directive: &FileDirective) -> String {
    match (directive, directive.action()) {
        (FileDirective::AddFile { path, lines }, _) => {
            format!("A {path} (+{} lines)", lines.len())
        }
        (FileDirective::DeleteFile { path }, _) => format!("D {path}"),
        (
            FileDirective::UpdateFile {
                path,
                move_to: Some(target),
                hunks,
            },
            DirectiveAction::Move,
        ) => format!("R {path} -> {target} ({} hunks)", hunks.len()),
        (FileDirective::UpdateFile { path, hunks, .. }, _) => {
            format!("M {path} ({} hunks)", hunks.len())
        }
    }
}

fn directive_json(directive: &FileDirective) -> Value {
    let mut value = json!({
        "action": directive.action(),
        "path": directive.path(),
    });
    match directive {
        FileDirective::AddFile { lines, .. } => {
            value["lines"] = json!(lines.len());
        }
        FileDirective::UpdateFile { move_to, hunks, .. } => {
            value["hunks"] = json!(hunks.len());
            if let Some(target) = move_to {
                value["move_to"] = json!(target);
            }
        }
        FileDirective::DeleteFile { .. } => {}
    }
    value
}

fn print_json(value: &Value) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{rendered}");
    Ok(())
}
