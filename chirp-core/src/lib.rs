mod audio;
mod config;
mod integrations;
mod util;

pub use audio::*;
pub use config::*;
pub use integrations::*;
pub use util::*;

/// The longest a tweet (or a bot reply) may be, in characters
pub const MAX_TWEET_LENGTH: usize = 280;
