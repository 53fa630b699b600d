//! Fixtures shared by unit tests.

use crate::download::Fetcher;
use crate::error::{GovmError, Result};
use crate::models::GoVersion;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A release-shaped tarball: everything under `go/`, with an executable
/// `go/bin/go` that reports `version` like the real toolchain does.
pub fn go_tarball(version: &str) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for dir in ["go/", "go/bin/"] {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        header.set_cksum();
        builder.append_data(&mut header, dir, std::io::empty()).unwrap();
    }

    let script = format!("#!/bin/sh\necho \"go version go{} linux/amd64\"\n", version);
    let files = [
        ("go/bin/go", script.into_bytes(), 0o755),
        ("go/VERSION", format!("go{}\n", version).into_bytes(), 0o644),
    ];
    for (path, data, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_mode(mode);
        header.set_size(data.len() as u64);
        header.set_cksum();
        builder.append_data(&mut header, path, data.as_slice()).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Serves one fixed archive body, or pretends the release does not exist.
pub struct StaticFetcher {
    body: Option<Vec<u8>>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn missing() -> Self {
        Self {
            body: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch_archive(&self, version: &GoVersion, dest: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.body {
            Some(body) => {
                tokio::fs::write(dest, body).await?;
                Ok(())
            }
            None => Err(GovmError::NotFound(version.dir_name())),
        }
    }
}
