use jobdash::secrets::SecretCipher;
use jobdash::storage;
use sea_orm::DatabaseConnection;

/// Builder for creating test users
pub struct UserBuilder {
    username: String,
    password: String,
    secret: String,
}

#[allow(dead_code)]
impl UserBuilder {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            password: "password123".to_string(),
            secret: String::new(),
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn with_secret(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    pub async fn create(self, db: &DatabaseConnection, cipher: &SecretCipher) -> storage::User {
        storage::register_user(db, cipher, &self.username, &self.password, &self.secret)
            .await
            .expect("Failed to create test user")
    }
}
