//! USD price resolution with a shared, TTL-bounded cache.

mod cache;
mod resolver;

pub use cache::{CacheExpiry, PriceCache};
pub use resolver::{PriceResolution, PriceResolver, PriceSource};
