use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub credential: String,
    pub role: Role,
    #[serde(default)]
    pub must_change_password: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct House {
    pub id: Uuid,
    pub client_id: Uuid,
    pub label: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consumption {
    pub id: Uuid,
    pub house_id: Uuid,
    pub date: NaiveDate,
    pub kwh: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetToken {
    pub email: String,
    pub token: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Database {
    pub users: Vec<User>,
    pub clients: Vec<Client>,
    pub houses: Vec<House>,
    pub consumptions: Vec<Consumption>,
    pub password_tokens: Vec<ResetToken>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
    pub must_change_password: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<UserResponse>,
    pub must_change_password: bool,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct CreatedUserResponse {
    pub user: UserResponse,
    pub temp_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub contact: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateHouseRequest {
    pub label: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateHouseRequest {
    pub label: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateConsumptionRequest {
    pub date: Option<NaiveDate>,
    pub kwh: f64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConsumptionRequest {
    pub date: Option<NaiveDate>,
    pub kwh: Option<f64>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub client_id: Option<Uuid>,
    pub house_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_kwh: f64,
    pub average_kwh: f64,
    pub variation_pct: f64,
    pub reading_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_kwh: f64,
    pub average_kwh: f64,
    pub variation_pct: f64,
    pub reading_count: usize,
    pub house_count: usize,
}

impl DashboardResponse {
    pub fn new(summary: Summary, house_count: usize) -> Self {
        Self {
            total_kwh: summary.total_kwh,
            average_kwh: summary.average_kwh,
            variation_pct: summary.variation_pct,
            reading_count: summary.reading_count,
            house_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
