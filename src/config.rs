use std::time::Duration;
use url::Url;

/// The API origin used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";

/// How long we wait for the server to acknowledge a logout before giving up.
pub const DEFAULT_LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by the transport and the session manager.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// The API origin every endpoint path is resolved against.
    pub base_url: Url,
    pub user_agent: String,
    /// Upper bound on the best-effort logout notification.
    pub logout_timeout: Duration,
}

impl Config {
    /// Create a [`Config`] pointing at `base_url`.
    ///
    /// A trailing slash is added when missing so relative endpoint paths
    /// like `login/` are joined onto the base instead of replacing its last
    /// segment.
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;

        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Config {
            base_url,
            ..Config::default()
        })
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Resolve an endpoint path against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: Url::parse(DEFAULT_BASE_URL)
                .expect("The default base URL is always valid"),
            user_agent: crate::DEFAULT_USER_AGENT.to_string(),
            logout_timeout: DEFAULT_LOGOUT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_joined_onto_the_base_path() {
        let config = Config::new("https://dojo.example.com/api").unwrap();

        let got = config.endpoint("/login/").unwrap();

        assert_eq!(got.as_str(), "https://dojo.example.com/api/login/");
    }

    #[test]
    fn default_points_at_the_local_backend() {
        let got = Config::default().endpoint("api/token/refresh/").unwrap();

        assert_eq!(got.as_str(), "http://127.0.0.1:8000/api/token/refresh/");
    }

    #[test]
    fn reject_garbage_base_urls() {
        assert!(Config::new("not a url").is_err());
    }
}
