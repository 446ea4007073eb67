use eyre::Result;

use crate::config::{
    loader::{ENV_INTEGRATION_API_URL, ENV_INTEGRATION_TOKEN},
    models::MeshConfig,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Mesh configuration validator
pub struct MeshConfigValidator;

impl MeshConfigValidator {
    /// Validate the entire mesh configuration, reporting every problem at once.
    pub fn validate(config: &MeshConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if config.integration.token.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("integration.token ({ENV_INTEGRATION_TOKEN})"),
            });
        }

        if config.integration.api_url.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("integration.api_url ({ENV_INTEGRATION_API_URL})"),
            });
        } else if let Err(e) = Self::validate_url(&config.integration.api_url, "integration.api_url")
        {
            errors.push(e);
        }

        for (name, url) in &config.tenant_urls {
            if let Err(e) = Self::validate_url(url, &format!("tenant URL {name}")) {
                errors.push(e);
            }
        }

        if let Err(e) = Self::validate_url(&config.app_base_url(), "app.host") {
            errors.push(e);
        }

        if config.app.port.is_empty() || !config.app.port.chars().all(|c| c.is_ascii_digit()) {
            errors.push(ValidationError::InvalidField {
                field: "app.port".to_string(),
                message: format!("Must be numeric, got '{}'", config.app.port),
            });
        }

        if let Err(e) = Self::validate_auth_path(
            &config.integration.salesforce_auth_path,
            "integration.salesforce_auth_path",
        ) {
            errors.push(e);
        }
        if let Err(e) = Self::validate_auth_path(
            &config.integration.data_action_target_auth_path,
            "integration.data_action_target_auth_path",
        ) {
            errors.push(e);
        }

        for pattern in &config.mesh.authentication.bypass_routes {
            if !pattern.starts_with('/') {
                errors.push(ValidationError::InvalidField {
                    field: format!("bypass route: {pattern}"),
                    message: "Bypass routes must start with '/'".to_string(),
                });
            }
        }

        let health_check = &config.mesh.health_check;
        if health_check.enable && !health_check.route.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: "mesh.health_check.route".to_string(),
                message: format!(
                    "Health check route must start with '/', got '{}'",
                    health_check.route
                ),
            });
        }

        if config.timeouts.auth_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "timeouts.auth_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }
        if config.timeouts.forward_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "timeouts.forward_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if config.limits.max_body_bytes == 0 {
            errors.push(ValidationError::InvalidField {
                field: "limits.max_body_bytes".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_auth_path(path: &str, context: &str) -> ValidationResult<()> {
        if !path.starts_with('/') {
            return Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Path must start with '/', got '{path}'"),
            });
        }
        Ok(())
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
