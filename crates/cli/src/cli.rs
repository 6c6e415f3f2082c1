use anyhow::Result;
use clap::{Parser, Subcommand};
use codeindex_core::{SearchRequest, SymbolKind, DEFAULT_SEARCH_LIMIT};
use std::path::PathBuf;

use crate::commands::{handle_export, handle_index, handle_search};
use crate::export::ExportFormat;

#[derive(Parser, Debug)]
#[command(name = "codeindex")]
#[command(about = "Persistent symbol index and structured code search")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a project into a symbol database [aliases: idx, i]
    #[command(visible_alias = "idx", visible_alias = "i")]
    Index {
        /// Project root to crawl
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Database file to write
        #[arg(value_name = "DB")]
        database: PathBuf,

        /// Extra classpath entries handed to parsers (comma separated)
        #[arg(long = "classpath", value_delimiter = ',')]
        classpath: Vec<PathBuf>,

        /// Delete the existing database first
        #[arg(long = "fresh")]
        fresh: bool,

        /// Show progress
        #[arg(short = 'p', long = "progress")]
        show_progress: bool,
    },

    /// Search symbols [aliases: s, find]
    #[command(visible_alias = "s", visible_alias = "find")]
    Search {
        /// Database file to query
        #[arg(value_name = "DB")]
        database: PathBuf,

        /// Search text; `Container::name` scopes to a class or package
        #[arg(short = 'q', long = "query")]
        query: Option<String>,

        /// Filter by kind (comma separated: class,method,...)
        #[arg(short = 'k', long = "kinds", value_delimiter = ',')]
        kinds: Vec<SymbolKind>,

        /// Filter by file path glob
        #[arg(short = 'f', long = "file")]
        file_glob: Option<String>,

        /// Filter by enclosing class
        #[arg(short = 'c', long = "class")]
        class_name: Option<String>,

        /// Filter by package
        #[arg(short = 'p', long = "package")]
        package_name: Option<String>,

        /// Maximum results
        #[arg(short = 'l', long = "limit", default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        /// Print results as JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Export the index as Markdown or XML [aliases: e]
    #[command(visible_alias = "e")]
    Export {
        /// Database file to read
        #[arg(value_name = "DB")]
        database: PathBuf,

        /// Output file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Export format
        #[arg(short = 'f', long = "format", value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,

        /// Only export these kinds (comma separated)
        #[arg(short = 'k', long = "kinds", value_delimiter = ',')]
        kinds: Vec<SymbolKind>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Index {
                project,
                database,
                classpath,
                fresh,
                show_progress,
            } => {
                handle_index(&project, &database, &classpath, fresh, show_progress)?;
            }
            Commands::Search {
                database,
                query,
                kinds,
                file_glob,
                class_name,
                package_name,
                limit,
                json,
            } => {
                let request =
                    build_request(query, kinds, file_glob, class_name, package_name, limit);
                handle_search(&database, &request, json)?;
            }
            Commands::Export {
                database,
                output,
                format,
                kinds,
            } => {
                handle_export(&database, &output, format, &kinds)?;
            }
        }
        Ok(())
    }
}

fn build_request(
    query: Option<String>,
    kinds: Vec<SymbolKind>,
    file_glob: Option<String>,
    class_name: Option<String>,
    package_name: Option<String>,
    limit: usize,
) -> SearchRequest {
    let mut request = SearchRequest::new().with_limit(limit);
    request.query = query;
    request.file_path_glob = file_glob;
    request.class_name = class_name;
    request.package_name = package_name;
    if !kinds.is_empty() {
        request = request.with_kinds(kinds);
    }
    request
}
