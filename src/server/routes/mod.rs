pub mod aggregate;
pub mod health;
pub mod scrape;

pub use aggregate::aggregate_handler;
pub use health::health_handler;
pub use scrape::scrape_handler;
