//! CameraCatalog - in-memory camera records
//!
//! ## Responsibilities
//!
//! - Cache of Camera records read by the session manager at start
//! - Validation of capture configuration on write
//! - Optional seeding from a JSON file (`CAMERAS_FILE`)

mod types;

pub use types::*;

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Camera catalog
pub struct CameraCatalog {
    cache: Arc<RwLock<HashMap<String, Camera>>>,
}

impl CameraCatalog {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed the catalog from a JSON array of cameras
    pub async fn load_json(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let cameras: Vec<Camera> = serde_json::from_str(&raw)?;

        for camera in &cameras {
            camera.validate()?;
        }

        let count = cameras.len();
        {
            let mut cache = self.cache.write().await;
            for camera in cameras {
                cache.insert(camera.camera_id.clone(), camera);
            }
        }

        tracing::info!(path = %path.display(), count = count, "Cameras loaded");
        Ok(count)
    }

    pub async fn get(&self, camera_id: &str) -> Option<Camera> {
        self.cache.read().await.get(camera_id).cloned()
    }

    /// Cached cameras ordered by id
    pub async fn list(&self) -> Vec<Camera> {
        let mut cameras: Vec<Camera> = self.cache.read().await.values().cloned().collect();
        cameras.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        cameras
    }

    /// Insert or replace a camera, returning the previous record
    pub async fn upsert(&self, camera: Camera) -> Result<Option<Camera>> {
        camera.validate()?;
        let camera_id = camera.camera_id.clone();
        let previous = self.cache.write().await.insert(camera_id.clone(), camera);
        tracing::info!(
            camera_id = %camera_id,
            replaced = previous.is_some(),
            "Camera saved"
        );
        Ok(previous)
    }

    pub async fn remove(&self, camera_id: &str) -> Result<Camera> {
        let removed = self.cache.write().await.remove(camera_id);
        match removed {
            Some(camera) => {
                tracing::info!(camera_id = %camera_id, "Camera removed");
                Ok(camera)
            }
            None => Err(Error::ResourceNotFound(format!("camera {}", camera_id))),
        }
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }
}

impl Default for CameraCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn camera(id: &str) -> Camera {
        Camera {
            camera_id: id.to_string(),
            name: format!("Camera {}", id),
            site_id: "site-1".to_string(),
            url: "synthetic://bars".to_string(),
            location: None,
            configuration: CaptureConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let catalog = CameraCatalog::new();
        assert!(catalog.upsert(camera("b")).await.unwrap().is_none());
        assert!(catalog.upsert(camera("a")).await.unwrap().is_none());
        assert!(catalog.upsert(camera("a")).await.unwrap().is_some());

        let ids: Vec<String> = catalog.list().await.into_iter().map(|c| c.camera_id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        catalog.remove("a").await.unwrap();
        assert!(catalog.get("a").await.is_none());
        assert!(matches!(
            catalog.remove("a").await,
            Err(Error::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_resolution() {
        let catalog = CameraCatalog::new();
        let mut cam = camera("a");
        cam.configuration.resolution = "wide".to_string();
        assert!(catalog.upsert(cam).await.is_err());
        assert_eq!(catalog.len().await, 0);
    }

    #[tokio::test]
    async fn test_upsert_rejects_unknown_model() {
        let catalog = CameraCatalog::new();
        let mut cam = camera("a");
        cam.configuration.model_type = "bogusModel".to_string();
        assert!(matches!(catalog.upsert(cam).await, Err(Error::UnknownModelType(_))));
        assert!(catalog.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_load_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"cameraId":"lobby","siteId":"hq","url":"synthetic://bars","configuration":{{"resolution":"320x240","frameRate":10}}}}]"#
        )
        .unwrap();

        let catalog = CameraCatalog::new();
        assert_eq!(catalog.load_json(file.path()).await.unwrap(), 1);
        let lobby = catalog.get("lobby").await.unwrap();
        assert_eq!(lobby.configuration.frame_rate, 10);
    }
}
