mod audio;
mod clients;

pub use audio::*;
pub use clients::*;
