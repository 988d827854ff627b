use std::fmt;
use std::str::FromStr;

use crate::ConfigurationError;

pub const BACKEND_ENV: &str = "BROWSER_BACKEND";
pub const GOOGLE_KEY_ENV: &str = "GOOGLE_KEY";
pub const GOOGLE_CX_ENV: &str = "GOOGLE_CX";
pub const EXA_KEY_ENV: &str = "EXA_API_KEY";
pub const YOUCOM_KEY_ENV: &str = "YDC_API_KEY";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Google,
    Exa,
    YouCom,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::Google, Self::Exa, Self::YouCom];

    pub fn id(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Exa => "exa",
            Self::YouCom => "youcom",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "exa" => Ok(Self::Exa),
            "youcom" | "you" | "you.com" => Ok(Self::YouCom),
            other => Err(ConfigurationError::new(format!(
                "unknown search backend '{other}' (expected one of: {})",
                Self::ALL.map(Self::id).join(", ")
            ))),
        }
    }
}

/// Keys for the selected backend. `Debug` never prints secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Google { api_key: String, cx: String },
    Exa { api_key: String },
    YouCom { api_key: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google { cx, .. } => f
                .debug_struct("Google")
                .field("api_key", &"<redacted>")
                .field("cx", cx)
                .finish(),
            Self::Exa { .. } => f.debug_struct("Exa").field("api_key", &"<redacted>").finish(),
            Self::YouCom { .. } => f
                .debug_struct("YouCom")
                .field("api_key", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    pub credentials: Credentials,
}

impl SearchConfig {
    pub fn backend(&self) -> BackendKind {
        match self.credentials {
            Credentials::Google { .. } => BackendKind::Google,
            Credentials::Exa { .. } => BackendKind::Exa,
            Credentials::YouCom { .. } => BackendKind::YouCom,
        }
    }

    /// Read the backend selector and its keys from process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; blank values count as missing.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let require = |key: &str, backend: BackendKind| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    ConfigurationError::new(format!(
                        "{key} must be set when {BACKEND_ENV}={backend}"
                    ))
                })
        };

        let Some(selector) = lookup(BACKEND_ENV).filter(|value| !value.trim().is_empty()) else {
            return Err(ConfigurationError::new(format!(
                "{BACKEND_ENV} is not set (expected one of: {})",
                BackendKind::ALL.map(BackendKind::id).join(", ")
            )));
        };
        let backend: BackendKind = selector.parse()?;

        let credentials = match backend {
            BackendKind::Google => Credentials::Google {
                api_key: require(GOOGLE_KEY_ENV, backend)?,
                cx: require(GOOGLE_CX_ENV, backend)?,
            },
            BackendKind::Exa => Credentials::Exa {
                api_key: require(EXA_KEY_ENV, backend)?,
            },
            BackendKind::YouCom => Credentials::YouCom {
                api_key: require(YOUCOM_KEY_ENV, backend)?,
            },
        };
        Ok(Self { credentials })
    }
}
