mod fetcher;
mod transform;

pub use fetcher::ApodFetcher;
pub use transform::transform;
