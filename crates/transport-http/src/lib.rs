// Transport for the audio asset

pub mod client;
pub mod fetch;

pub use client::HttpClient;
pub use fetch::{AssetFetcher, Fetcher};
