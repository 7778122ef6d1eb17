use std::env;

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stripe: StripeConfig,
    pub admin_token: String,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub server: String,
    pub port: u32,
    pub database: String,
    pub url_override: Option<String>,
}

#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port: env_or("SERVER_PORT", "8080").parse().unwrap_or(8080),
            },
            database: DatabaseConfig {
                username: env_or("DB_USER", "bookserver"),
                password: env_or("DB_PASSWORD", ""),
                server: env_or("DB_HOST", "localhost"),
                port: env_or("DB_PORT", "5432").parse().unwrap_or(5432),
                database: env_or("DB_NAME", "bookserver"),
                url_override: env::var("DATABASE_URL").ok(),
            },
            stripe: StripeConfig {
                secret_key: env::var("STRIPE_SECRET_KEY").ok(),
                webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
                success_url: env_or("CHECKOUT_SUCCESS_URL", "http://localhost:3000/booking/success"),
                cancel_url: env_or("CHECKOUT_CANCEL_URL", "http://localhost:3000/booking/cancelled"),
            },
            admin_token: env_or("ADMIN_API_TOKEN", ""),
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database.url_override {
            return url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password,
            self.database.server,
            self.database.port,
            self.database.database
        )
    }
}
