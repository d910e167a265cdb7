mod client;

pub use client::{parse_sha1_sidecar, sha1_hex, Downloader};
