mod client;

pub use client::{Resource, StorageClient, StorageError, TransferLink};
