use crate::errors::AppError;
use crate::models::{
    CreateUserRequest, ProfileUpdateRequest, ResetToken, Role, UpdateUserRequest, User,
};
use crate::password;
use crate::storage::Store;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

impl Store {
    pub fn find_user(&self, id: Uuid) -> Option<&User> {
        self.db.users.iter().find(|user| user.id == id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        self.db
            .users
            .iter()
            .find(|user| same_email(&user.email, email))
    }

    pub async fn register_user(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        role: Option<Role>,
    ) -> Result<User, AppError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(AppError::MissingField("name"));
        }
        if email.is_empty() {
            return Err(AppError::MissingField("email"));
        }
        if password.is_empty() {
            return Err(AppError::MissingField("password"));
        }
        if self.find_user_by_email(email).is_some() {
            return Err(AppError::DuplicateEmail);
        }

        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            credential: password::hash(password)?,
            role: role.unwrap_or(Role::User),
            must_change_password: false,
            created_at: Utc::now(),
        };
        self.db.users.push(user.clone());
        self.commit().await?;
        Ok(user)
    }

    pub fn verify_login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self
            .find_user_by_email(email.trim())
            .ok_or(AppError::NotFound("user"))?;
        if !password::verify(password, &user.credential)? {
            return Err(AppError::WrongCredential);
        }
        Ok(user.clone())
    }

    pub async fn request_password_reset(&mut self, email: &str) -> Result<ResetToken, AppError> {
        self.request_password_reset_at(email, Utc::now()).await
    }

    // Requests accumulate; every unexpired token for the email stays redeemable.
    pub async fn request_password_reset_at(
        &mut self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<ResetToken, AppError> {
        let user = self
            .find_user_by_email(email.trim())
            .ok_or(AppError::NotFound("user"))?;
        let entry = ResetToken {
            email: user.email.clone(),
            token: password::generate_token(),
            expires: now + Duration::hours(1),
        };
        self.db.password_tokens.push(entry.clone());

        self.commit().await?;
        Ok(entry)
    }

    pub async fn reset_password(
        &mut self,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        self.reset_password_at(email, token, new_password, Utc::now())
            .await
    }

    pub async fn reset_password_at(
        &mut self,
        email: &str,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if new_password.is_empty() {
            return Err(AppError::MissingField("new_password"));
        }

        let email = email.trim();
        // A token that expires exactly now is already dead.
        let matched = self.db.password_tokens.iter().any(|entry| {
            same_email(&entry.email, email) && entry.token == token && entry.expires > now
        });
        if !matched {
            return Err(AppError::InvalidOrExpiredToken);
        }
        let credential = password::hash(new_password)?;
        let user = self
            .db
            .users
            .iter_mut()
            .find(|user| same_email(&user.email, email))
            .ok_or(AppError::NotFound("user"))?;
        user.credential = credential;
        user.must_change_password = false;

        self.db
            .password_tokens
            .retain(|entry| !(same_email(&entry.email, email) && entry.token == token));

        self.commit().await?;
        Ok(())
    }

    // Choosing a new password here satisfies a pending forced rotation.
    pub async fn update_profile(
        &mut self,
        user_id: Uuid,
        req: ProfileUpdateRequest,
    ) -> Result<User, AppError> {
        let name = match req.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::MissingField("name"));
                }
                Some(name)
            }
            None => None,
        };
        let credential = match req.password.as_deref() {
            Some("") => return Err(AppError::MissingField("password")),
            Some(password) => Some(password::hash(password)?),
            None => None,
        };

        let user = self
            .db
            .users
            .iter_mut()
            .find(|user| user.id == user_id)
            .ok_or(AppError::NotFound("user"))?;
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(credential) = credential {
            user.credential = credential;
            user.must_change_password = false;
        }
        let updated = user.clone();

        self.commit().await?;
        Ok(updated)
    }

    pub fn list_users(&self) -> Vec<User> {
        self.db.users.clone()
    }

    // The generated password is returned once so the admin can hand it over;
    // the account must rotate it at first login.
    pub async fn admin_create_user(
        &mut self,
        req: CreateUserRequest,
    ) -> Result<(User, String), AppError> {
        let name = req.name.trim();
        let email = req.email.trim();
        if name.is_empty() {
            return Err(AppError::MissingField("name"));
        }
        if email.is_empty() {
            return Err(AppError::MissingField("email"));
        }
        if self.find_user_by_email(email).is_some() {
            return Err(AppError::DuplicateEmail);
        }

        let temp_password = password::generate_temp_password();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            credential: password::hash(&temp_password)?,
            role: req.role.unwrap_or(Role::User),
            must_change_password: true,
            created_at: Utc::now(),
        };
        self.db.users.push(user.clone());

        self.commit().await?;
        Ok((user, temp_password))
    }

    pub async fn admin_update_user(
        &mut self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<User, AppError> {
        let name = match req.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::MissingField("name"));
                }
                Some(name)
            }
            None => None,
        };

        let user = self
            .db
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(AppError::NotFound("user"))?;
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(role) = req.role {
            user.role = role;
        }
        let updated = user.clone();

        self.commit().await?;
        Ok(updated)
    }

    pub async fn remove_user(&mut self, id: Uuid) -> Result<(), AppError> {
        let email = self
            .find_user(id)
            .map(|user| user.email.clone())
            .ok_or(AppError::NotFound("user"))?;

        let client_ids: Vec<Uuid> = self
            .db
            .clients
            .iter()
            .filter(|client| client.user_id == id)
            .map(|client| client.id)
            .collect();
        let house_ids: Vec<Uuid> = self
            .db
            .houses
            .iter()
            .filter(|house| client_ids.contains(&house.client_id))
            .map(|house| house.id)
            .collect();

        self.db
            .consumptions
            .retain(|reading| !house_ids.contains(&reading.house_id));
        self.db
            .houses
            .retain(|house| !client_ids.contains(&house.client_id));
        self.db.clients.retain(|client| client.user_id != id);
        self.db
            .password_tokens
            .retain(|entry| !same_email(&entry.email, &email));
        self.db.users.retain(|user| user.id != id);

        self.commit().await?;
        Ok(())
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
