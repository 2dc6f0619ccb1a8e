use std::env;
use std::fmt;

/// Name of the variable selecting the [`Environment`].
pub const ENV_VAR: &str = "WAM_ENV";

/// The deployment mode. Development enables static directory watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Reads `WAM_ENV`; anything but `production` means development.
    pub fn from_env() -> Self {
        env::var(ENV_VAR).map_or(Environment::Development, |value| Self::parse(&value))
    }

    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}
