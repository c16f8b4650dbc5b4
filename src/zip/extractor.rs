use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ArchiveError, Result};
use crate::io::{ReadAt, make_dirs, open_write_stream};
use crate::stream::copy;

use super::reader::Archive;
use super::structures::ZipFileEntry;

/// Select the entries whose name starts with `prefix` and ends with `suffix`,
/// keyed by what lies between the two.
///
/// ```
/// # use std::collections::BTreeMap;
/// # use zipstream::zip::select_entries;
/// let entries = BTreeMap::from([("a/b.txt", 1), ("a/c.json", 2), ("d.txt", 3)]);
/// let selected = select_entries(&entries, "a/", Some(".txt"));
/// assert_eq!(selected, BTreeMap::from([("b".to_string(), &1)]));
/// ```
pub fn select_entries<'a, K, V>(
    entries: &'a BTreeMap<K, V>,
    prefix: &str,
    suffix: Option<&str>,
) -> BTreeMap<String, &'a V>
where
    K: AsRef<str> + Ord,
{
    let suffix = suffix.unwrap_or("");
    entries
        .iter()
        .filter_map(|(name, value)| {
            let middle = name.as_ref().strip_prefix(prefix)?.strip_suffix(suffix)?;
            Some((middle.to_string(), value))
        })
        .collect()
}

/// Join an archive-internal name onto `root`, one native component per
/// `/`-separated segment. Only a directory may resolve to `root` itself.
fn resolve_destination(root: &Path, name: &str, is_directory: bool) -> Result<PathBuf> {
    if name.starts_with('/') {
        return Err(ArchiveError::UnsafePath(name.to_string()));
    }
    let mut destination = root.to_path_buf();
    let mut depth = 0;
    for segment in name.split('/') {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (None, _) | (Some(Component::CurDir), None) => {}
            (Some(Component::Normal(part)), None) => {
                destination.push(part);
                depth += 1;
            }
            _ => return Err(ArchiveError::UnsafePath(name.to_string())),
        }
    }
    if depth == 0 && !is_directory {
        return Err(ArchiveError::UnsafePath(name.to_string()));
    }
    Ok(destination)
}

impl<R: ReadAt + 'static> Archive<R> {
    /// Entries of this archive selected by [`select_entries`].
    pub fn select(&self, prefix: &str, suffix: Option<&str>) -> BTreeMap<String, &ZipFileEntry> {
        select_entries(self.entries(), prefix, suffix)
    }

    /// Decode `entry` into a new file at `path`, creating missing parents.
    ///
    /// Directory entries create the directory.
    pub async fn extract_file(&self, entry: &ZipFileEntry, path: &Path) -> Result<()> {
        if entry.is_directory {
            return make_dirs(path).await;
        }
        let copied = copy(self.entry_stream(entry), open_write_stream(Some(path))).await?;
        debug!(entry = %entry.file_name, path = %path.display(), bytes = copied, "extracted");
        Ok(())
    }

    /// Decode `entry` to standard output.
    pub async fn extract_to_stdout(&self, entry: &ZipFileEntry) -> Result<()> {
        copy(self.entry_stream(entry), open_write_stream(None)).await?;
        Ok(())
    }

    /// Extract every `(name, entry)` of `selection` under `target_dir`.
    ///
    /// `name` is the path relative to `target_dir`, with `/` separators; it
    /// may differ from the entry's own name, as with [`Archive::select`].
    /// All extractions run concurrently and each runs to its own end. The
    /// first failure to complete is returned once every extraction is done.
    /// Files already written stay on disk.
    pub async fn extract_all<'a, I, K>(&self, selection: I, target_dir: &Path) -> Result<()>
    where
        I: IntoIterator<Item = (K, &'a ZipFileEntry)>,
        K: AsRef<str>,
    {
        let mut pending: FuturesUnordered<_> = selection
            .into_iter()
            .map(|(name, entry)| {
                let destination = resolve_destination(target_dir, name.as_ref(), entry.is_directory);
                async move {
                    let destination = destination?;
                    self.extract_file(entry, &destination).await
                }
            })
            .collect();

        let total = pending.len();
        let mut first_error = None;
        while let Some(result) = pending.next().await {
            if let Err(err) = result {
                warn!(archive = %self.label(), error = %err, "extraction failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                debug!(archive = %self.label(), target = %target_dir.display(), entries = total, "extracted all");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_strips_prefix_and_suffix() {
        let entries = BTreeMap::from([
            ("a/b.txt".to_string(), 'X'),
            ("a/c.json".to_string(), 'Y'),
            ("d.txt".to_string(), 'Z'),
        ]);
        let selected = select_entries(&entries, "a/", Some(".txt"));
        assert_eq!(selected, BTreeMap::from([("b".to_string(), &'X')]));
    }

    #[test]
    fn selection_without_suffix_keeps_extension() {
        let entries = BTreeMap::from([("payload/x.json", 1), ("payload/y/z.json", 2), ("other", 3)]);
        let selected = select_entries(&entries, "payload/", None);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected["x.json"], &1);
        assert_eq!(selected["y/z.json"], &2);
    }

    #[test]
    fn selection_ignores_overlapping_prefix_and_suffix() {
        let entries = BTreeMap::from([("a.txt", 1)]);
        assert!(select_entries(&entries, "a.txt", Some(".txt")).is_empty());
    }

    #[test]
    fn destinations_use_native_components() {
        let root = Path::new("out");
        assert_eq!(
            resolve_destination(root, "a/b/c.txt", false).unwrap(),
            root.join("a").join("b").join("c.txt")
        );
        assert_eq!(resolve_destination(root, "dir/", true).unwrap(), root.join("dir"));
        assert_eq!(resolve_destination(root, "", true).unwrap(), root);
    }

    #[test]
    fn destinations_cannot_escape_root() {
        let root = Path::new("out");
        for bad in ["../x", "a/../../x", "/abs", "", "./"] {
            assert!(
                matches!(resolve_destination(root, bad, false), Err(ArchiveError::UnsafePath(_))),
                "{bad} accepted"
            );
        }
    }
}
