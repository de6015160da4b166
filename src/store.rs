use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::Product;

pub type SharedStore = Arc<ProductStore>;

/// Product collection persisted as a single JSON document.
///
/// Writes overwrite the whole file and are not crash-safe. Read-modify-write
/// cycles made through this type hold `lock`, so requests in this process
/// never drop each other's updates.
pub struct ProductStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ProductStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing, empty or malformed documents all read as an empty collection.
    pub async fn load(&self) -> Vec<Product> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        if contents.iter().all(u8::is_ascii_whitespace) {
            return Vec::new();
        }

        match serde_json::from_slice(&contents) {
            Ok(products) => products,
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed product store {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    pub async fn save(&self, products: &[Product]) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(products)?;
        fs::write(&self.path, json).await
    }

    pub async fn append(&self, product: Product) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut products = self.load().await;
        products.push(product);
        self.save(&products).await
    }

    /// Open the backing file of the product owning `file_id` without counting it.
    pub async fn find_download(&self, file_id: Uuid) -> io::Result<Option<Download>> {
        let products = self.load().await;
        let Some(product) = products.into_iter().find(|p| p.file_id == file_id) else {
            return Ok(None);
        };

        Ok(open_backing_file(&product.file_path)
            .await?
            .map(|(file, size)| Download { product, file, size }))
    }

    /// Open the backing file of the product owning `file_id` and bump its
    /// download counter.
    ///
    /// The file is opened before the counter moves. Returns `None`, leaving the
    /// store untouched, when no product matches or its backing file can't be
    /// opened as a regular file.
    pub async fn record_download(&self, file_id: Uuid) -> io::Result<Option<Download>> {
        let _guard = self.lock.lock().await;
        let mut products = self.load().await;

        let Some(product) = products.iter_mut().find(|p| p.file_id == file_id) else {
            return Ok(None);
        };
        let Some((file, size)) = open_backing_file(&product.file_path).await? else {
            return Ok(None);
        };

        product.downloads += 1;
        let product = product.clone();
        self.save(&products).await?;

        Ok(Some(Download {
            product,
            file,
            size,
        }))
    }
}

/// A product together with its opened asset file.
#[derive(Debug)]
pub struct Download {
    pub product: Product,
    pub file: fs::File,
    pub size: u64,
}

async fn open_backing_file(path: &str) -> io::Result<Option<(fs::File, u64)>> {
    let file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Ok(None);
    }

    Ok(Some((file, metadata.len())))
}
