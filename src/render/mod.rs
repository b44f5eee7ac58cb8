//! Terminal rendering for the watch viewer

mod renderer;

pub use renderer::{Renderer, WatchOverlay};
