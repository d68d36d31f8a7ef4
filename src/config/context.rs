//! Request context configuration.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::parse::{env_bool, env_duration, env_list, env_opt, env_parse_opt};
use super::ConfigError;
use crate::cache::CacheFactory;
use crate::cookies::{CookieOptions, SameSite};
use crate::core::Renderer;
use crate::fetch::Fetcher;
use crate::ip::IpHeaderRanking;
use crate::request_id::RequestIdValidator;

/// Where request ids come from and where they go.
#[derive(Clone)]
pub struct RequestIdConfig {
    /// Inbound headers checked in order.
    pub inbound: Vec<String>,
    /// Header carrying the id on outbound fetches.
    pub outbound: Option<String>,
    /// Accepts or rejects inbound values.
    pub validate: Option<RequestIdValidator>,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            inbound: vec!["x-request-id".to_string(), "cf-ray".to_string()],
            outbound: Some("x-request-id".to_string()),
            validate: None,
        }
    }
}

impl fmt::Debug for RequestIdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIdConfig")
            .field("inbound", &self.inbound)
            .field("outbound", &self.outbound)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// Configuration shared by every context of an app.
#[derive(Clone)]
pub struct ContextConfig {
    /// Environment exposed to handlers and the logger.
    pub env: Map<String, Value>,
    /// Trust forwarding headers for the client IP.
    pub trust_proxy: bool,
    /// Host used for relative redirects when the request has none.
    pub host: Option<String>,
    pub request_id: RequestIdConfig,
    /// Default cookie attributes.
    pub cookies: CookieOptions,
    /// Default request timeout in milliseconds.
    pub timeout: Option<u64>,
    pub cache: Option<Arc<dyn CacheFactory>>,
    pub fetcher: Option<Arc<dyn Fetcher>>,
    pub renderer: Option<Arc<dyn Renderer>>,
    /// Forwarding header ranking, the process-wide one unless replaced.
    pub ip_headers: Arc<IpHeaderRanking>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            env: Map::new(),
            trust_proxy: true,
            host: None,
            request_id: RequestIdConfig::default(),
            cookies: CookieOptions::default(),
            timeout: None,
            cache: None,
            fetcher: None,
            renderer: None,
            ip_headers: IpHeaderRanking::global(),
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Collaborators (cache, fetcher, renderer) are never read from the
    /// environment and stay unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            trust_proxy: env_bool("TRUST_PROXY", true),
            host: env_opt("HOST"),
            ..Self::default()
        };

        if let Some(inbound) = env_list("REQUEST_ID_INBOUND") {
            config.request_id.inbound = inbound;
        }
        if let Some(outbound) = env_opt("REQUEST_ID_OUTBOUND") {
            config.request_id.outbound = match outbound.to_lowercase().as_str() {
                "off" | "none" => None,
                name => Some(name.to_string()),
            };
        }

        config.timeout = env_duration("REQUEST_TIMEOUT", "off")?
            .map(|d| d.as_millis().min(u64::MAX as u128) as u64);

        config.cookies = CookieOptions {
            path: env_opt("COOKIE_PATH"),
            domain: env_opt("COOKIE_DOMAIN"),
            secure: env_opt("COOKIE_SECURE").map(|_| env_bool("COOKIE_SECURE", true)),
            httponly: env_opt("COOKIE_HTTPONLY").map(|_| env_bool("COOKIE_HTTPONLY", false)),
            samesite: env_parse_opt::<SameSite>("COOKIE_SAMESITE")?,
            ..CookieOptions::default()
        };

        Ok(config)
    }

    pub fn with_env(mut self, env: Map<String, Value>) -> Self {
        self.env = env;
        self
    }

    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_request_id(mut self, request_id: RequestIdConfig) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_cookies(mut self, cookies: CookieOptions) -> Self {
        self.cookies = cookies;
        self
    }

    /// Default timeout in milliseconds.
    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheFactory>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_ip_headers(mut self, ranking: Arc<IpHeaderRanking>) -> Self {
        self.ip_headers = ranking;
        self
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextConfig")
            .field("env", &self.env)
            .field("trust_proxy", &self.trust_proxy)
            .field("host", &self.host)
            .field("request_id", &self.request_id)
            .field("cookies", &self.cookies)
            .field("timeout", &self.timeout)
            .field("cache", &self.cache.is_some())
            .field("fetcher", &self.fetcher.is_some())
            .field("renderer", &self.renderer.is_some())
            .finish_non_exhaustive()
    }
}
