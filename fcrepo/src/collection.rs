//! Mirror a container tree to and from a local directory.
//!
//! On disk a container is a directory whose `index.ttl` holds the
//! container's turtle. A binary `name` is a plain file, described by an
//! optional `name.ttl` next to it. A `name.ttl` with nothing called `name`
//! beside it is an RDF container without children.
use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use tracing::{debug, info, instrument, warn};

use crate::{errors::Error, fs::Fs, location::Children, path::RemotePath, tree::Walker, turtle};

/// Turtle of the container a directory stands for.
pub const INDEX_FILE: &str = "index.ttl";

const TURTLE_EXT: &str = ".ttl";

/// What an import or export touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    /// Containers written.
    pub containers: usize,
    /// Binaries written.
    pub binaries: usize,
    /// Binary descriptions written.
    pub descriptions: usize,
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} containers, {} binaries, {} descriptions",
            self.containers, self.binaries, self.descriptions
        )
    }
}

#[derive(Debug, Default)]
struct Listing {
    dirs: Vec<String>,
    files: BTreeMap<String, PathBuf>,
}

async fn list_dir(dir: &Path) -> crate::Result<Listing> {
    let mut listing = Listing::default();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            warn!(path = ?entry.path(), "skipping non-utf-8 file name");
            continue;
        };

        if name.starts_with('.') {
            continue;
        }

        if entry.path().is_dir() {
            listing.dirs.push(name);
        } else {
            listing.files.insert(name, entry.path());
        }
    }

    listing.dirs.sort();
    Ok(listing)
}

/// Parse every turtle file below `local`.
async fn check_turtle(fs: &Fs, local: &Path) -> crate::Result<()> {
    let mut seen = HashSet::new();
    let mut stack = vec![local.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if !seen.insert(tokio::fs::canonicalize(&dir).await?) {
            continue;
        }

        let listing = list_dir(&dir).await?;

        for (name, path) in &listing.files {
            if !name.ends_with(TURTLE_EXT) {
                continue;
            }

            let src = tokio::fs::read_to_string(path).await?;
            if let Err(e) = turtle::parse(&src, fs.prefixes()) {
                warn!(path = %path.display(), "malformed turtle");
                return Err(e.into());
            }
        }

        stack.extend(listing.dirs.iter().map(|name| dir.join(name)));
    }

    Ok(())
}

/// Import the directory `local` into the container `remote`. Existing
/// containers are replaced leniently; binaries are uploaded again. All
/// turtle is parsed before the first request is sent.
///
/// # Errors
///
/// - [`Error::Parse`] for the first malformed turtle file
/// - a local file cannot be read
/// - [`Error::CycleDetected`] if a directory is reached twice through links
/// - any repository error; the import stops there
#[instrument(skip(fs))]
pub async fn import(fs: &Fs, local: &Path, remote: &RemotePath) -> crate::Result<Report> {
    check_turtle(fs, local).await?;

    let mut report = Report::default();
    let mut seen = HashSet::new();
    let mut stack = vec![(local.to_path_buf(), remote.clone(), None::<PathBuf>)];

    while let Some((dir, container, sidecar)) = stack.pop() {
        if !seen.insert(tokio::fs::canonicalize(&dir).await?) {
            return Err(Error::CycleDetected(container));
        }

        let listing = list_dir(&dir).await?;

        let index = listing
            .files
            .get(INDEX_FILE)
            .cloned()
            .or(sidecar);
        let turtle = match index {
            Some(index) => tokio::fs::read_to_string(index).await?,
            None => String::new(),
        };

        if turtle.is_empty() && fs.exists(&container).await? {
            debug!(%container, "keeping existing container");
        } else {
            fs.put_turtle(&container, turtle, true).await?;
            report.containers += 1;
        }

        for (name, path) in &listing.files {
            if name == INDEX_FILE {
                continue;
            }

            if let Some(stem) = name.strip_suffix(TURTLE_EXT) {
                if listing.files.contains_key(stem) || listing.dirs.iter().any(|d| d == stem) {
                    continue;
                }

                let turtle = tokio::fs::read_to_string(path).await?;
                fs.put_turtle(&container.join(stem), turtle, true).await?;
                report.containers += 1;
                continue;
            }

            let metadata = match listing.files.get(&format!("{name}{TURTLE_EXT}")) {
                Some(path) => Some(tokio::fs::read_to_string(path).await?),
                None => None,
            };

            fs.put_binary(&container.join(name), path, None, metadata.as_deref())
                .await?;
            report.binaries += 1;
            report.descriptions += usize::from(metadata.is_some());
        }

        for name in listing.dirs.iter().rev() {
            let sidecar = listing
                .files
                .get(&format!("{name}{TURTLE_EXT}"))
                .cloned();

            stack.push((dir.join(name), container.join(name), sidecar));
        }
    }

    info!(%report, "import complete");
    Ok(report)
}

/// Export the tree below `remote` into the directory `local`. Members
/// reported outside of `remote` are skipped.
///
/// # Errors
///
/// - [`Error::CycleDetected`]
/// - a local file cannot be written
/// - any repository error; the export stops there
#[instrument(skip(fs))]
pub async fn export(fs: &Fs, remote: &RemotePath, local: &Path) -> crate::Result<Report> {
    let mut report = Report::default();
    let mut walker = Walker::new(fs, remote.clone());

    tokio::fs::create_dir_all(local).await?;

    while let Some((path, children)) = walker.step().await? {
        let dest = if path == *remote {
            match children {
                Children::Binary => local.join(path.file_name().unwrap_or("root")),
                Children::Container(_) => local.to_path_buf(),
            }
        } else {
            let Some(rel) = path.relative_to(remote) else {
                warn!(%path, "skipping member outside the exported tree");
                continue;
            };
            local.join(rel)
        };

        match children {
            Children::Container(_) => {
                tokio::fs::create_dir_all(&dest).await?;
                let turtle = fs.editable_turtle(&path).await?;
                tokio::fs::write(dest.join(INDEX_FILE), turtle).await?;
                report.containers += 1;
            }
            Children::Binary => {
                let bytes = fs.download(&path, &dest).await?;
                debug!(%path, bytes, "downloaded");
                report.binaries += 1;

                let tx = fs.session().transaction();
                let location = fs
                    .info(&path)
                    .await?
                    .description(fs.session().endpoint(), tx.as_deref());
                let turtle = fs.editable_turtle(&location).await?;

                let mut sidecar = dest.into_os_string();
                sidecar.push(TURTLE_EXT);
                tokio::fs::write(sidecar, turtle).await?;
                report.descriptions += 1;
            }
        }
    }

    info!(%report, "export complete");
    Ok(report)
}
