pub mod archive;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod emit;
pub mod error;
pub mod index;
pub mod page;
pub mod remote;
pub mod source;
pub mod token;
pub mod types;

pub use archive::{ArchiveBuilder, ArchiveCodec, ArchiveEntry, BuiltArchive, ZipCodec};
pub use bridge::{
    BackgroundRelay, BridgeEndpoint, BridgeRequest, BridgeResponse, CodecProvisioner,
    ContentBridge, DownloadResponse, PageHost,
};
pub use cache::{CacheStatus, LoadState, ProjectDataCache};
pub use config::DownloaderConfig;
pub use coordinator::DownloadCoordinator;
pub use emit::{DirectorySink, MemorySink, SaveAction};
pub use error::{DownloadError, ErrorKind, Result};
pub use index::{PathEntry, PathIndex};
pub use page::{AuthSlot, HtmlPageState, PageStateReader, StaticPageState};
pub use remote::RemoteSource;
pub use source::ProjectSource;
pub use token::{TokenLocator, TokenStrategy};
pub use types::{
    DownloadRequest, DownloadResult, EmittedFile, FileRecord, ProjectSnapshot, RequestKind,
    SourceCodeResponse,
};
