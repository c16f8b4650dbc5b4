use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::tempdir;

use zipstream::{Archive, ArchiveError, ArchiveWriter};

async fn build(entries: &[(&str, &str)]) -> Result<Archive<Vec<u8>>> {
    let mut writer = ArchiveWriter::new(Vec::new());
    for (i, (name, contents)) in entries.iter().enumerate() {
        writer
            .append_buffer(name, contents, SystemTime::now(), i % 2 == 1)
            .await?;
    }
    let bytes = writer.finish().await?;
    Ok(Archive::from_reader(Arc::new(bytes), "fixture").await?)
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

#[tokio::test]
async fn extract_all_writes_every_entry() -> Result<()> {
    let archive = build(&[
        ("top.txt", "top level"),
        ("a/b/c/deep.txt", "deep inside"),
        ("a/sibling.txt", "next to b"),
    ])
    .await?;
    let target = tempdir()?;

    archive.extract_all(archive.entries(), target.path()).await?;

    assert_eq!(read(&target.path().join("top.txt")), "top level");
    assert_eq!(
        read(&target.path().join("a").join("b").join("c").join("deep.txt")),
        "deep inside"
    );
    assert_eq!(read(&target.path().join("a").join("sibling.txt")), "next to b");
    Ok(())
}

#[tokio::test]
async fn extract_selection_strips_prefix() -> Result<()> {
    let archive = build(&[
        ("payload/one.json", "1"),
        ("payload/nested/two.json", "2"),
        ("payload/skip.txt", "no"),
        ("meta.json", "m"),
    ])
    .await?;
    let target = tempdir()?;

    let selection = archive.select("payload/", Some(".json"));
    assert_eq!(selection.len(), 2);
    archive.extract_all(selection, target.path()).await?;

    assert_eq!(read(&target.path().join("one")), "1");
    assert_eq!(read(&target.path().join("nested").join("two")), "2");
    assert!(!target.path().join("skip.txt").exists());
    assert!(!target.path().join("meta.json").exists());
    Ok(())
}

#[tokio::test]
async fn failed_entry_leaves_siblings_on_disk() -> Result<()> {
    let archive = build(&[
        ("ok1.txt", "first"),
        ("blocked/inner.txt", "cannot be written"),
        ("nested/ok2.txt", "second"),
    ])
    .await?;
    let target = tempdir()?;
    // A plain file where a directory is needed
    std::fs::write(target.path().join("blocked"), b"in the way")?;

    let result = archive.extract_all(archive.entries(), target.path()).await;

    assert!(matches!(result, Err(ArchiveError::Io(_))));
    assert_eq!(read(&target.path().join("ok1.txt")), "first");
    assert_eq!(read(&target.path().join("nested").join("ok2.txt")), "second");

    // The archive stays usable after a failed extraction
    let entry = archive.entry("blocked/inner.txt").expect("entry indexed");
    assert_eq!(archive.entry_text(entry, true).await?, "cannot be written");
    Ok(())
}

#[tokio::test]
async fn directory_entries_become_directories() -> Result<()> {
    let archive = build(&[("assets/", ""), ("assets/logo.svg", "<svg/>"), ("empty/", "")]).await?;
    let target = tempdir()?;

    archive.extract_all(archive.entries(), target.path()).await?;

    assert!(target.path().join("assets").is_dir());
    assert!(target.path().join("empty").is_dir());
    assert_eq!(read(&target.path().join("assets").join("logo.svg")), "<svg/>");
    Ok(())
}

#[tokio::test]
async fn extract_file_targets_explicit_path() -> Result<()> {
    let archive = build(&[("inner/name.txt", "renamed on the way out")]).await?;
    let target = tempdir()?;
    let path = target.path().join("elsewhere").join("custom.txt");

    let entry = archive.entry("inner/name.txt").expect("entry indexed");
    archive.extract_file(entry, &path).await?;

    assert_eq!(read(&path), "renamed on the way out");
    Ok(())
}

#[tokio::test]
async fn empty_selection_succeeds() -> Result<()> {
    let archive = build(&[("a.txt", "a")]).await?;
    let target = tempdir()?;

    archive
        .extract_all(archive.select("missing/", None), target.path())
        .await?;

    assert_eq!(std::fs::read_dir(target.path())?.count(), 0);
    Ok(())
}
