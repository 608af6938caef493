//! Job-scoped temporary storage.
//!
//! A [`Workspace`] is a uniquely named directory created for exactly one Job. It holds the
//! input document, the rendered page images, and the normalized output. Dropping the workspace
//! removes the directory recursively, so every exit path (success, error, panic, or a cancelled
//! request future) releases it; [`Workspace::close`] does the same while reporting errors.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

const INPUT_FILE: &str = "input.pdf";
const OUTPUT_FILE: &str = "output.pdf";
const PAGES_DIR: &str = "pages";

/// Private temporary directory owned by one Job.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Allocate a fresh workspace under `root`, or under the system temp dir when `None`.
    pub fn create(job_id: Uuid, root: Option<&Path>) -> io::Result<Self> {
        let prefix = format!("pdfocr-{job_id}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!(job_id = %job_id, path = %dir.path().display(), "Workspace allocated");
        Ok(Self { dir })
    }

    /// Root directory of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location of the stored input document.
    pub fn input_path(&self) -> PathBuf {
        self.dir.path().join(INPUT_FILE)
    }

    /// Directory receiving rendered page images.
    pub fn pages_dir(&self) -> PathBuf {
        self.dir.path().join(PAGES_DIR)
    }

    /// Location of the normalized output document.
    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_FILE)
    }

    /// Persist the uploaded document as the workspace input.
    pub async fn write_input(&self, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.input_path();
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Remove the workspace recursively, reporting any failure.
    pub async fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        tokio::task::spawn_blocking(move || self.dir.close())
            .await
            .map_err(io::Error::other)??;
        tracing::debug!(path = %path.display(), "Workspace released");
        Ok(())
    }
}

/// A rasterized page stored inside a [`Workspace`].
///
/// The image file is deleted by [`PageImage::discard`] once its text has been read, and by
/// `Drop` on any path that skips the explicit discard.
#[derive(Debug)]
pub struct PageImage {
    page_number: u32,
    path: PathBuf,
    dpi: u32,
    discarded: bool,
}

impl PageImage {
    /// Track an image file rendered for `page_number` at `dpi`.
    pub fn new(page_number: u32, path: PathBuf, dpi: u32) -> Self {
        Self {
            page_number,
            path,
            dpi,
            discarded: false,
        }
    }

    /// 1-based page number.
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Image file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render resolution.
    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Delete the image file.
    pub async fn discard(mut self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        self.discarded = true;
        Ok(())
    }
}

impl Drop for PageImage {
    fn drop(&mut self) {
        if !self.discarded {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(path: &Path) -> usize {
        std::fs::read_dir(path).map(|dir| dir.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn close_removes_everything_under_root() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(Uuid::new_v4(), Some(root.path())).unwrap();
        workspace.write_input(b"%PDF-1.4").await.unwrap();
        std::fs::create_dir_all(workspace.pages_dir()).unwrap();
        std::fs::write(workspace.pages_dir().join("page-1.png"), b"png").unwrap();
        assert_eq!(entries(root.path()), 1);

        workspace.close().await.unwrap();
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn drop_releases_workspace() {
        let root = tempfile::tempdir().unwrap();
        {
            let workspace = Workspace::create(Uuid::new_v4(), Some(root.path())).unwrap();
            std::fs::write(workspace.input_path(), b"%PDF-1.4").unwrap();
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn workspaces_never_collide() {
        let root = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let first = Workspace::create(id, Some(root.path())).unwrap();
        let second = Workspace::create(id, Some(root.path())).unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(root.path()));
    }

    #[tokio::test]
    async fn discard_deletes_page_image() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("page-1.png");
        std::fs::write(&path, b"png").unwrap();
        let image = PageImage::new(1, path.clone(), 300);
        assert_eq!(image.dpi(), 300);
        image.discard().await.unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn dropped_page_image_is_deleted() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("page-2.png");
        std::fs::write(&path, b"png").unwrap();
        drop(PageImage::new(2, path.clone(), 300));
        assert!(!path.exists());
    }
}
