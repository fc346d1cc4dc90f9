#![forbid(unsafe_code)]

pub mod captions;
pub mod config;
pub mod fetcher;
pub mod loader;
pub mod resource;
pub mod sources;
pub mod summarize;

pub use captions::{CaptionTrack, Transcript};
pub use config::{FetcherConfig, StrategyKind, SummarizerConfig};
pub use fetcher::{Attempt, Failure, FailureKind, FetchError, Fetcher, Outcome, Strategy};
pub use loader::{DocumentLoader, HttpLoader, LoadError};
pub use resource::{video_id_from_url, watch_url, ResourceId};
pub use sources::{
    build_fetcher, build_fetcher_with_loader, FullFetchStrategy, IndexStrategy, MetadataExtractor,
    ScrapeStrategy, YtDlpExtractor,
};
pub use summarize::{
    summary_prompt, ChatCompletionsModel, ChatMessage, CompletionError, CompletionModel, Role,
    Summarizer,
};

pub use tokio_util::sync::CancellationToken;
