use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;

use crate::errors::AppError;

pub fn hash(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let derived = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::internal(format!("derive credential: {err}")))?;
    Ok(derived.to_string())
}

pub fn verify(password: &str, credential: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(credential)
        .map_err(|err| AppError::internal(format!("parse credential: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rng().fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn generate_temp_password() -> String {
    generate_token()[..12].to_string()
}
