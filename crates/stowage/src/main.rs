use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use std::io::Write;
use std::path::Path;
use stowage::config::{AUTHOR_ENV, LOG_ENV};
use stowage::{Args, Command, Config};
use stowage_repo::{
    FileState, Repository, RequestStructure, Sandbox, StructureNode, StructureRequest,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter(args.verbose)));
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let location = config.location(args.location.as_deref());
    tracing::debug!(location = %location.display(), "using repository");

    match args.command {
        Command::Init { parents } => {
            Repository::create(&location, parents)?;
            println!("Initialized empty repository in {}", location.display());
        }
        Command::Ls { rev, path } => {
            let subpath = path.map(|p| split_segments(&[p])).unwrap_or_default();
            let request = StructureRequest::new().maybe_rev(rev).subpath(subpath).build();
            match RequestStructure::new(&location, request)?.structure()? {
                StructureNode::Manifest(node) => {
                    for dir in node.dentries() {
                        println!("{}/", dir.basename);
                    }
                    for file in node.fentries() {
                        let mode = if file.executable { "x" } else { "-" };
                        println!("{} {:>10} {}", mode, file.size, file.basename);
                    }
                }
                StructureNode::File(file) => {
                    println!("{:>10} {}", file.entry().size, file.path());
                }
            }
        }
        Command::Cat { rev, path } => {
            let repo = Repository::open(&location, None)?;
            let content = repo.read(rev.as_deref(), &path)?;
            std::io::stdout().write_all(&content).into_diagnostic()?;
        }
        Command::Add {
            path,
            from,
            content,
        } => {
            let content = match (from, content) {
                (Some(from), _) => std::fs::read(&from).into_diagnostic()?,
                (None, Some(text)) => text.into_bytes(),
                (None, None) => {
                    let mut buf = Vec::new();
                    std::io::Read::read_to_end(&mut std::io::stdin(), &mut buf).into_diagnostic()?;
                    buf
                }
            };
            sandbox(&location)?.add_file_content(&path, content)?;
        }
        Command::Mkdir { path } => {
            sandbox(&location)?.mkdir(&path)?;
        }
        Command::Mv { mut paths } => {
            let destination = paths
                .pop()
                .ok_or_else(|| miette!("mv needs a destination"))?;
            let outcome = sandbox(&location)?.rename(paths, &destination)?;
            for failure in &outcome.failures {
                eprintln!("skipped {}: {}", failure.source, failure.error);
            }
            for copied in &outcome.copied {
                println!("{} -> {}", copied.basename, copied.target);
            }
        }
        Command::Rm { path } => {
            let count = sandbox(&location)?.remove(&path)?;
            println!("removed {} file(s)", count);
        }
        Command::Status { all } => {
            let status = sandbox(&location)?.status()?;
            for (path, state) in status.entries() {
                if !all && matches!(state, FileState::Clean | FileState::Ignored) {
                    continue;
                }
                println!("{} {}", status_letter(state), path);
            }
        }
        Command::Commit { message, author } => {
            let author = config
                .author(author.as_deref(), std::env::var(AUTHOR_ENV).ok())
                .ok_or_else(|| {
                    miette!(
                        help = format!("pass --author, set author in the config, or set {}", AUTHOR_ENV),
                        "no commit author configured"
                    )
                })?;
            let id = sandbox(&location)?.commit(&message, &author)?;
            println!("committed {}", id);
        }
        Command::Log { rev, limit } => {
            let repo = Repository::open(&location, None)?;
            for ctx in repo.log(rev.as_deref(), limit)? {
                println!(
                    "{}:{} {} {}",
                    ctx.number,
                    ctx.id.short(),
                    ctx.time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    ctx.author.unwrap_or_default()
                );
                if let Some(summary) = ctx.summary {
                    println!("    {}", summary);
                }
            }
        }
        Command::Show { rev, subpath } => {
            let request = StructureRequest::new()
                .maybe_rev(rev)
                .subpath(split_segments(&subpath))
                .build();
            let node = RequestStructure::new(&location, request)?.structure()?;
            let json = serde_json::to_string_pretty(&node).into_diagnostic()?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn sandbox(location: &Path) -> Result<Sandbox> {
    Ok(Sandbox::open(location)?)
}

/// Accept both `a/b` and `a b` as segment lists
fn split_segments(parts: &[String]) -> Vec<String> {
    parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn status_letter(state: FileState) -> char {
    match state {
        FileState::Modified => 'M',
        FileState::Added => 'A',
        FileState::Removed => 'R',
        FileState::Deleted => '!',
        FileState::Unknown => '?',
        FileState::Ignored => 'I',
        FileState::Clean => 'C',
    }
}
