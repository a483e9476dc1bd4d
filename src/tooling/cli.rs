//! CLI Tooling
//!
//! Command-line interface for Yeek: run the server, manage catalog records and
//! inspect the projected share tree.

use crate::catalog::{FileRecord, Revision, SledCatalog};
use crate::config::YeekConfig;
use crate::content::FsContentStore;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::projection::{BuilderWorker, Directory, ProjectionState, Renderer, TreeBuilder};
use crate::server::{self, AppState};
use crate::service::CatalogService;
use crate::types::FileId;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Yeek CLI - media catalog hosting with a read-only WebDAV share
#[derive(Parser)]
#[command(name = "yeek")]
#[command(about = "Host media files and browse them over a read-only WebDAV share")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base directory for relative storage paths
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Fold logging flags into the loaded logging config
    pub fn apply_logging_overrides(&self, logging: &mut LoggingConfig) {
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the WebDAV share and download endpoint until interrupted
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Manage catalog records
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Build the share tree once and print it
    Tree {
        /// Maximum directory depth to print
        #[arg(long)]
        depth: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Upload a single file
    Add {
        /// File to upload
        file: PathBuf,
        #[command(flatten)]
        revision: RevisionArgs,
    },
    /// Upload every matching file below a directory, named after the file stem
    Import {
        dir: PathBuf,
        /// File extensions to pick up
        #[arg(long = "extension", default_values = ["mid", "midi"])]
        extensions: Vec<String>,
        /// Album for every imported file
        #[arg(long)]
        album: Option<String>,
        /// Artist for every imported file (repeatable)
        #[arg(long = "artist")]
        artists: Vec<String>,
    },
    /// Replace the revision of a file
    Edit {
        id: String,
        #[command(flatten)]
        revision: RevisionArgs,
    },
    /// Mark a file deleted
    Remove {
        id: String,
        #[arg(long, default_value = "")]
        reason: String,
        /// Allow the same content to be uploaded again
        #[arg(long)]
        allow_reupload: bool,
    },
    /// List catalog records
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Include deleted records
        #[arg(long)]
        all: bool,
    },
}

/// Revision fields shared by add and edit
#[derive(Args)]
pub struct RevisionArgs {
    #[arg(long)]
    pub track: String,
    #[arg(long)]
    pub album: Option<String>,
    /// Artist credit (repeatable, in order)
    #[arg(long = "artist")]
    pub artists: Vec<String>,
    #[arg(long, default_value = "")]
    pub description: String,
}

impl RevisionArgs {
    pub fn to_revision(&self) -> Revision {
        Revision {
            track_name: self.track.clone(),
            album_name: self.album.clone(),
            artist_names: self.artists.clone(),
            description: self.description.clone(),
        }
    }
}

/// CLI context: loaded config plus the opened catalog and content store
pub struct CliContext {
    config: YeekConfig,
    service: Arc<CatalogService>,
}

impl CliContext {
    /// Open storage named by `config`, resolving relative paths against `data_root`
    pub fn new(config: YeekConfig, data_root: &Path) -> Result<Self, ApiError> {
        let (content_dir, catalog_path) = config.storage.resolve_paths(data_root);
        let catalog = Arc::new(SledCatalog::open(&catalog_path)?);
        let content = Arc::new(FsContentStore::new(
            content_dir,
            config.storage.create_missing_directories,
        )?);
        let service = Arc::new(CatalogService::new(
            catalog,
            content,
            Arc::new(ProjectionState::new()),
            config.storage.max_upload_bytes,
            config.builder.file_extension.trim(),
        ));
        Ok(Self { config, service })
    }

    pub fn config(&self) -> &YeekConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<CatalogService> {
        &self.service
    }

    fn tree_builder(&self, state: Arc<ProjectionState>) -> TreeBuilder {
        TreeBuilder::new(
            state,
            self.service.catalog().clone(),
            self.config.builder.options(),
        )
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Serve { bind } => self.serve(bind.as_deref()).await,
            Commands::Catalog { command } => self.execute_catalog(command).await,
            Commands::Tree { depth } => {
                let state = Arc::new(ProjectionState::new());
                let report = self.tree_builder(Arc::clone(&state)).run_pass().await?;
                let root = state.snapshot_root();
                let mut output = format_tree(&root, *depth);
                output.push_str(&format!(
                    "\n{} files placed in {} ms",
                    report.reindexed, report.duration_ms
                ));
                Ok(output)
            }
        }
    }

    async fn serve(&self, bind: Option<&str>) -> Result<String, ApiError> {
        let mut server_config = self.config.server.clone();
        if let Some(bind) = bind {
            server_config.bind = bind.to_string();
        }
        let addr = server_config.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;

        let worker = BuilderWorker::new(
            self.tree_builder(Arc::clone(self.service.state())),
            self.config.builder.interval(),
        );
        worker.start();

        let renderer = Renderer::new(&server_config.dav_prefix, self.config.builder.content_type.clone());
        let app = server::router(AppState::new(
            Arc::clone(&self.service),
            renderer,
            server_config.retry_after_secs,
        ));

        let served = server::serve(listener, app, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
        })
        .await;

        worker.stop().await;
        served?;
        Ok("Server stopped".to_string())
    }

    async fn execute_catalog(&self, command: &CatalogCommands) -> Result<String, ApiError> {
        match command {
            CatalogCommands::Add { file, revision } => {
                let bytes = tokio::fs::read(file).await?;
                let record = self
                    .service
                    .ingest(&bytes, &original_name(file), revision.to_revision())
                    .await?;
                Ok(format!(
                    "Added {} as {}",
                    record.id,
                    record.display_name(self.service.extension())
                ))
            }
            CatalogCommands::Import {
                dir,
                extensions,
                album,
                artists,
            } => self.import(dir, extensions, album.as_deref(), artists).await,
            CatalogCommands::Edit { id, revision } => {
                let record = self
                    .service
                    .edit(parse_id(id)?, revision.to_revision())
                    .await?;
                Ok(format!(
                    "Updated {}: {}",
                    record.id,
                    record.display_name(self.service.extension())
                ))
            }
            CatalogCommands::Remove {
                id,
                reason,
                allow_reupload,
            } => {
                let record = self
                    .service
                    .delete(parse_id(id)?, reason, *allow_reupload)
                    .await?;
                Ok(format!("Removed {}", record.id))
            }
            CatalogCommands::List { format, all } => {
                let records = self.service.list(*all)?;
                match format.as_str() {
                    "json" => Ok(serde_json::to_string_pretty(&records)?),
                    "text" => Ok(format_records_table(&records)),
                    other => Err(ApiError::ConfigError(format!(
                        "Invalid format: {} (must be 'text' or 'json')",
                        other
                    ))),
                }
            }
        }
    }

    async fn import(
        &self,
        dir: &Path,
        extensions: &[String],
        album: Option<&str>,
        artists: &[String],
    ) -> Result<String, ApiError> {
        let mut added = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;

        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    failed += 1;
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !has_extension(path, extensions) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let mut revision = Revision::new(stem).with_artists(artists.iter().cloned());
            if let Some(album) = album {
                revision = revision.with_album(album);
            }

            let bytes = tokio::fs::read(path).await?;
            match self.service.ingest(&bytes, &original_name(path), revision).await {
                Ok(record) => {
                    info!(file_id = %record.id, path = %path.display(), "Imported file");
                    added += 1;
                }
                Err(ApiError::DuplicateContent(_) | ApiError::ReuploadBlocked(_)) => skipped += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to import file");
                    failed += 1;
                }
            }
        }

        Ok(format!(
            "Imported {} files ({} duplicates skipped, {} failed)",
            added, skipped, failed
        ))
    }
}

fn parse_id(id: &str) -> Result<FileId, ApiError> {
    id.trim()
        .parse()
        .map_err(|_| ApiError::ConfigError(format!("Invalid file id: {}", id)))
}

fn original_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

fn format_records_table(records: &[FileRecord]) -> String {
    if records.is_empty() {
        return "No files in catalog.".to_string();
    }
    use comfy_table::Table;
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["ID", "Track", "Album", "Artists", "Size", "Uploaded", "Downloads", "State"]);
    for r in records {
        let state = match &r.deleted {
            Some(d) if d.reason.is_empty() => "deleted".to_string(),
            Some(d) => format!("deleted: {}", d.reason),
            None => "active".to_string(),
        };
        table.add_row(vec![
            r.id.to_string(),
            r.revision.track_name.clone(),
            r.revision.album().unwrap_or("-").to_string(),
            r.revision.artist_label().unwrap_or_else(|| "-".to_string()),
            r.size.to_string(),
            r.uploaded_on.format("%Y-%m-%d %H:%M").to_string(),
            r.downloads.to_string(),
            state,
        ]);
    }
    table.to_string()
}

/// Indented listing of the tree, directories first, down to `max_depth` levels
pub fn format_tree(root: &Directory, max_depth: Option<usize>) -> String {
    let mut out = String::from("/\n");
    write_tree(&mut out, root, 1, max_depth);
    out
}

fn write_tree(out: &mut String, dir: &Directory, level: usize, max_depth: Option<usize>) {
    if max_depth.is_some_and(|max| level > max) {
        return;
    }
    let indent = "  ".repeat(level);
    for child in dir.children() {
        out.push_str(&format!("{}{}/\n", indent, child.name().unwrap_or_default()));
        write_tree(out, child, level + 1, max_depth);
    }
    for file in dir.files() {
        out.push_str(&format!("{}{}\n", indent, file.display_name));
    }
}
