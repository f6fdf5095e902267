use std::io;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces the file at `path` with `contents`. Each call writes its own temp
/// file beside the target and renames it over the target, so readers see
/// either the old or the new contents and concurrent writers never share a
/// temp file. The last rename wins.
pub async fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    tokio::fs::write(tmp.path(), contents).await?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replaces_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        replace_file(&path, b"old").await.unwrap();
        replace_file(&path, b"new").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("data.json");
        let err = replace_file(&path, b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writers_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let a = vec![b'a'; 256 * 1024];
        let b = vec![b'b'; 256 * 1024];

        let writer = |contents: Vec<u8>| {
            let path = path.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    replace_file(&path, &contents).await?;
                }
                Ok::<_, io::Error>(())
            })
        };
        let (first, second) = tokio::join!(writer(a.clone()), writer(b.clone()));
        first.unwrap().unwrap();
        second.unwrap().unwrap();

        let landed = std::fs::read(&path).unwrap();
        assert!(landed == a || landed == b);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
