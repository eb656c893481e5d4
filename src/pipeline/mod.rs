// Scrape pipeline: validation, identity, dedupe, retention, and the cycle that runs them

pub mod cycle;
pub mod dedupe;
pub mod identity;
pub mod retention;
pub mod validate;

pub use cycle::{parse_page, CycleSettings, ParsedBatch, ScrapeCycle};
pub use dedupe::dedupe_by_id;
pub use identity::IdentityScheme;
pub use retention::sweep_expired;
pub use validate::{Reading, Region, Rejection, Validator};
