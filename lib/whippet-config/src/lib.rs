//! Primitives for working with typed and untyped configuration data.
#![deny(warnings)]
#![deny(missing_docs)]

use std::borrow::Cow;
use std::path::Path;

use figment::error::Kind;
use figment::providers::{Env, Format as _, Yaml};
use figment::Figment;
use serde::de::DeserializeOwned;
use snafu::Snafu;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// Requested field was missing from the configuration.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Help text describing how to set the missing field.
        help_text: String,

        /// Name of the missing field.
        field: Cow<'static, str>,
    },

    /// Requested field's value was not of the expected data type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Name of the invalid field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Generic configuration error.
    #[snafu(display("Failed to query configuration: {}", source))]
    Generic {
        /// Error source.
        source: figment::Error,
    },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        match e.kind {
            Kind::InvalidType(actual_ty, expected_ty) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            },
            _ => Self::Generic { source: e },
        }
    }
}

/// A configuration loader that can pull from various sources.
///
/// This loader wraps a lower-level library, `figment`, to expose a simpler and focused API for
/// loading configuration data and querying it. Sources added later take precedence over sources
/// added prior, so environment variables are typically layered on top of the configuration file.
#[derive(Default)]
pub struct ConfigurationLoader {
    inner: Figment,
    env_prefix: Option<String>,
}

impl ConfigurationLoader {
    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or is not valid YAML, querying the resulting configuration
    /// will surface the error.
    pub fn from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        self.inner = self.inner.merge(Yaml::file_exact(path.as_ref()));
        self
    }

    /// Loads the given YAML configuration file, if it exists.
    ///
    /// Missing files are skipped silently, which suits optional host-level configuration.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        self.inner = self.inner.merge(Yaml::file(path.as_ref()));
        self
    }

    /// Loads environment variables carrying the given prefix.
    ///
    /// The prefix is uppercased and joined to the key with an underscore: with the prefix
    /// `WHIPPET`, the variable `WHIPPET_FLUSH_INTERVAL` maps to the `flush_interval` field.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, an error is returned.
    pub fn from_environment(mut self, prefix: &str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let full_prefix = format!("{}_", prefix.to_uppercase());
        self.inner = self.inner.merge(Env::prefixed(&full_prefix));
        self.env_prefix = Some(full_prefix);
        Ok(self)
    }

    /// Consumes this loader, returning a generic configuration.
    pub fn into_generic(self) -> GenericConfiguration {
        GenericConfiguration {
            inner: self.inner,
            env_prefix: self.env_prefix,
        }
    }
}

/// Loaded configuration data, queried by field or extracted into typed structs.
pub struct GenericConfiguration {
    inner: Figment,
    env_prefix: Option<String>,
}

impl GenericConfiguration {
    /// Gets a typed value from the configuration.
    ///
    /// # Errors
    ///
    /// If the field is missing, or could not be deserialized into `T`, an error is returned. The
    /// missing-field error names the environment variable form of the field when environment
    /// variables were loaded.
    pub fn get_typed<T>(&self, field: &'static str) -> Result<T, ConfigurationError>
    where
        T: DeserializeOwned,
    {
        match self.try_get_typed(field)? {
            Some(value) => Ok(value),
            None => Err(ConfigurationError::MissingField {
                help_text: self.missing_field_help_text(field),
                field: field.into(),
            }),
        }
    }

    /// Gets a typed value from the configuration, if the field is present.
    ///
    /// # Errors
    ///
    /// If a present field could not be deserialized into `T`, an error is returned.
    pub fn try_get_typed<T>(&self, field: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: DeserializeOwned,
    {
        match self.inner.find_value(field) {
            Ok(_) => self.inner.extract_inner(field).map(Some).map_err(Into::into),
            Err(_) => Ok(None),
        }
    }

    /// Gets a typed value from the configuration, or the type's default if the field is absent or
    /// invalid.
    pub fn get_typed_or_default<T>(&self, field: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.try_get_typed(field).ok().flatten().unwrap_or_default()
    }

    /// Extracts the entire configuration into a typed struct.
    ///
    /// Fields absent from the configuration fall back to the struct's serde defaults.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error is returned.
    pub fn as_typed<T>(&self) -> Result<T, ConfigurationError>
    where
        T: DeserializeOwned,
    {
        self.inner.extract().map_err(Into::into)
    }

    fn missing_field_help_text(&self, field: &str) -> String {
        match &self.env_prefix {
            Some(prefix) => format!(
                "Set it in the configuration file or via the {}{} environment variable.",
                prefix,
                field.to_uppercase()
            ),
            None => "Set it in the configuration file.".to_string(),
        }
    }
}
