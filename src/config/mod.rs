use std::env;

const DEFAULT_IDENTITY_HEADER: &str = "x-user-id";
const DEFAULT_LOGIN_PATH: &str = "/users/sign_in";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. Without one the service keeps its data
    /// in memory.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,

    // Requester resolution (authentication itself happens upstream)
    pub identity_header: String,
    pub proxy_token: Option<String>,
    pub login_path: String,

    // Listings
    pub index_limit: i64,
    pub home_response_limit: i64,

    /// Upper bound on cached statistics fragments.
    pub fragment_cache_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: "0.0.0.0".into(),
            port: 8080,
            identity_header: DEFAULT_IDENTITY_HEADER.into(),
            proxy_token: None,
            login_path: DEFAULT_LOGIN_PATH.into(),
            index_limit: 100,
            home_response_limit: 25,
            fragment_cache_capacity: crate::cache::DEFAULT_CAPACITY,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            identity_header: env::var("IDENTITY_HEADER")
                .map(|h| h.to_lowercase())
                .unwrap_or(defaults.identity_header),
            proxy_token: env::var("PROXY_TOKEN").ok().filter(|s| !s.is_empty()),
            login_path: env::var("LOGIN_PATH").unwrap_or(defaults.login_path),

            index_limit: env::var("INDEX_LIMIT")
                .unwrap_or_else(|_| "100".into())
                .parse()
                .unwrap_or(defaults.index_limit),
            home_response_limit: env::var("HOME_RESPONSE_LIMIT")
                .unwrap_or_else(|_| "25".into())
                .parse()
                .unwrap_or(defaults.home_response_limit),
            fragment_cache_capacity: env::var("FRAGMENT_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fragment_cache_capacity),
        })
    }

    pub fn uses_database(&self) -> bool {
        self.database_url.is_some()
    }
}
