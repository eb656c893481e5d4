pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod feed;
pub mod graphql;
pub mod logging;
pub mod observability;
pub mod parser;
pub mod pipeline;
pub mod server;
pub mod source;
pub mod storage;
pub mod types;

pub use error::{FeedError, Result};
pub use feed::{FeedService, FeedSettings};
pub use pipeline::{CycleSettings, ScrapeCycle};
pub use types::{CycleReport, Event, RecentEvents, StoredEvent};
