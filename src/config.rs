use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// JSON document holding the product collection
    pub products_file: PathBuf,
    /// Directory uploaded images and asset files are written to
    pub uploads_dir: PathBuf,
    /// Directory holding `index.html`, `create.html` and any other static files
    pub static_dir: PathBuf,
    pub max_upload_size: usize,
}

impl Config {
    const DEFAULT_PORT: u16 = 8000;
    const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024; // 100MB

    pub fn from_env() -> Result<Self, String> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|e| format!("Invalid PORT: {}", e))?,
            Err(_) => Self::DEFAULT_PORT,
        };

        let max_upload_size = match env::var("MAX_UPLOAD_SIZE") {
            Ok(value) => value
                .parse::<usize>()
                .map_err(|_| "MAX_UPLOAD_SIZE must be a valid number".to_string())?,
            Err(_) => Self::DEFAULT_MAX_UPLOAD_SIZE,
        };

        Ok(Self {
            host,
            port,
            products_file: env_path("PRODUCTS_FILE", "products.json"),
            uploads_dir: env_path("UPLOAD_FOLDER", "uploads"),
            static_dir: env_path("STATIC_DIR", "."),
            max_upload_size,
        })
    }

    /// Config rooted at `root`, used by tests to keep every file inside a temp dir.
    #[cfg(test)]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            host: "127.0.0.1".to_string(),
            port: Self::DEFAULT_PORT,
            products_file: root.join("products.json"),
            uploads_dir: root.join("uploads"),
            static_dir: root,
            max_upload_size: Self::DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
