use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use log::error;

use project_downloader::{
    ArchiveBuilder, DirectorySink, DownloadCoordinator, DownloadError, DownloadRequest,
    DownloaderConfig, HtmlPageState, ProjectDataCache, RemoteSource, RequestKind, TokenLocator,
    ZipCodec,
};

#[derive(Parser, Debug)]
#[command(name = "project-downloader", about = "Download a project's source files")]
struct Cli {
    /// Saved HTML of the project page, searched for the auth token
    #[arg(long)]
    page: Option<PathBuf>,

    /// URL of the project page; the project id is read from it
    #[arg(long)]
    url: Option<String>,

    /// Project id, overriding the one in --url
    #[arg(long)]
    project: Option<String>,

    /// Auth token, overriding the one found in --page
    #[arg(long)]
    token: Option<String>,

    #[arg(long, value_enum, default_value_t = Kind::Project)]
    kind: Kind,

    /// File or folder path inside the project
    #[arg(long)]
    path: Option<String>,

    /// Output directory (defaults to PROJECT_DOWNLOADER_OUTPUT_DIR or .)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    File,
    Folder,
    Project,
}

impl From<Kind> for RequestKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::File => RequestKind::SingleFile,
            Kind::Folder => RequestKind::Folder,
            Kind::Project => RequestKind::WholeProject,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    // Override the log level with the RUST_LOG environment variable.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<bool, DownloadError> {
    let mut config = DownloaderConfig::from_env()?;
    if let Some(out) = cli.out {
        config.output_dir = out;
    }

    let html = match &cli.page {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => String::new(),
    };
    let mut page = HtmlPageState::parse(&html);
    if let Some(url) = &cli.url {
        page = page.with_location(url.clone());
    }

    let coordinator = DownloadCoordinator::from_parts(
        TokenLocator::new(Arc::new(page)),
        ProjectDataCache::new(Arc::new(RemoteSource::from_config(&config))),
        ArchiveBuilder::new(Arc::new(ZipCodec)).with_compression_level(config.compression_level),
        Arc::new(DirectorySink::new(config.output_dir.clone())),
    );

    let request = DownloadRequest {
        kind: cli.kind.into(),
        path: cli.path,
        project_id: cli.project,
        token: cli.token,
    };

    let result = coordinator.handle(&request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.success)
}
