pub mod indexer;

pub use indexer::IndexerClient;
