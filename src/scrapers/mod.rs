pub mod adapter;
pub mod browser;
pub mod direct;
pub mod engine;
pub mod fallback;
pub mod sites;
pub mod traits;
pub mod types;

pub use browser::RenderedFetcher;
pub use direct::DirectFetcher;
pub use fallback::FallbackOrchestrator;
