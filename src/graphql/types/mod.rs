pub mod event;

pub use event::{QuakeEvent, RecentQuakes};
