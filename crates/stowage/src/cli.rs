use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and modify versioned model workspaces")]
pub struct Args {
    /// Path to KDL config file (default: stowage.kdl if present)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Repository location, overrides the config file
    #[arg(short = 'C', long = "location")]
    pub location: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new, empty repository
    Init {
        /// Create missing parent directories
        #[arg(long)]
        parents: bool,
    },

    /// List one directory of a revision
    Ls {
        /// Revision (number, id, tip or null)
        #[arg(short = 'r', long)]
        rev: Option<String>,

        /// Directory to list, root if omitted
        path: Option<String>,
    },

    /// Print a file as of a revision
    Cat {
        /// Revision (number, id, tip or null)
        #[arg(short = 'r', long)]
        rev: Option<String>,

        path: String,
    },

    /// Write a file into the working tree and stage it
    Add {
        path: String,

        /// Read content from this local file
        #[arg(long, conflicts_with = "content")]
        from: Option<PathBuf>,

        /// Use this text as content
        #[arg(long)]
        content: Option<String>,
    },

    /// Create a directory in the working tree
    Mkdir { path: String },

    /// Move tracked files or directories; the last path is the destination
    Mv {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
    },

    /// Unstage and delete a tracked file or directory
    Rm { path: String },

    /// Show working tree status
    Status {
        /// Also list clean and ignored files
        #[arg(short = 'A', long)]
        all: bool,
    },

    /// Commit staged changes
    Commit {
        #[arg(short = 'm', long)]
        message: String,

        /// `Name <email>`, overrides config and STOWAGE_AUTHOR
        #[arg(short = 'u', long)]
        author: Option<String>,
    },

    /// Show history, newest first
    Log {
        /// Revision to start from
        #[arg(short = 'r', long)]
        rev: Option<String>,

        /// Maximum number of entries
        #[arg(short = 'l', long)]
        limit: Option<usize>,
    },

    /// Print the structure node for a path as JSON
    Show {
        /// Revision (number, id, tip or null)
        #[arg(short = 'r', long)]
        rev: Option<String>,

        /// Path segments, `a/b` and `a b` are equivalent
        subpath: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mv() {
        let args = Args::try_parse_from(["stowage", "-C", "/srv/ws", "mv", "a", "b", "dest"]).unwrap();
        assert_eq!(args.location, Some(PathBuf::from("/srv/ws")));
        match args.command {
            Command::Mv { paths } => assert_eq!(paths, vec!["a", "b", "dest"]),
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Args::try_parse_from(["stowage", "mv", "only"]).is_err());
    }

    #[test]
    fn test_parse_add_sources_conflict() {
        let err = Args::try_parse_from([
            "stowage", "add", "f", "--from", "local.txt", "--content", "x",
        ]);
        assert!(err.is_err());

        let args = Args::try_parse_from(["stowage", "commit", "-m", "msg"]).unwrap();
        assert!(matches!(args.command, Command::Commit { author: None, .. }));
    }
}
