use crate::errors::AppError;
use crate::models::{Database, Role, User};
use crate::password;
use chrono::Utc;
use std::{
    env,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{error, info};
use uuid::Uuid;

pub const SEED_ADMIN_EMAIL: &str = "admin@myenergy.local";
pub const SEED_ADMIN_PASSWORD: &str = "admin123";

pub fn resolve_data_path() -> PathBuf {
    if let Ok(path) = env::var("MYENERGY_DATA_PATH") {
        return PathBuf::from(path);
    }

    PathBuf::from("data/myenergy.json")
}

pub struct Store {
    path: Option<PathBuf>,
    pub(crate) db: Database,
}

impl Store {
    pub async fn open(path: &Path) -> Result<Self, AppError> {
        match fs::read(path).await {
            Ok(bytes) => {
                let db = serde_json::from_slice(&bytes).map_err(|err| {
                    error!("failed to parse data file {}: {err}", path.display());
                    AppError::internal(format!("parse data file: {err}"))
                })?;
                Ok(Self {
                    path: Some(path.to_path_buf()),
                    db,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("no data file at {}, seeding default database", path.display());
                let store = Self {
                    path: Some(path.to_path_buf()),
                    db: seed_database()?,
                };
                store.commit().await?;
                Ok(store)
            }
            Err(err) => {
                error!("failed to read data file {}: {err}", path.display());
                Err(err.into())
            }
        }
    }

    pub fn in_memory() -> Result<Self, AppError> {
        Ok(Self {
            path: None,
            db: seed_database()?,
        })
    }

    // Full-document write, atomic from the caller's side: the previous file
    // stays intact until the rename.
    pub async fn commit(&self) -> Result<(), AppError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let payload = serde_json::to_vec_pretty(&self.db).map_err(AppError::internal)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

pub fn seed_database() -> Result<Database, AppError> {
    let mut db = Database::default();
    db.users.push(User {
        id: Uuid::new_v4(),
        name: "Admin".to_string(),
        email: SEED_ADMIN_EMAIL.to_string(),
        credential: password::hash(SEED_ADMIN_PASSWORD)?,
        role: Role::Admin,
        must_change_password: true,
        created_at: Utc::now(),
    });
    Ok(db)
}
