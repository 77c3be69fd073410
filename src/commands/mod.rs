pub mod analytics;
pub mod backup;
pub mod connections;
pub mod query;
pub mod schema;
pub mod settings;

use serde::Serialize;

use crate::error::CoreError;

/// Structured failure payload at the command boundary. Expected failures
/// (bad query, unreachable host) arrive as this rather than a panic or an
/// opaque string.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub error: String,
    pub error_kind: String,
}

impl From<CoreError> for CommandError {
    fn from(e: CoreError) -> Self {
        CommandError {
            error_kind: e.kind().to_string(),
            error: e.to_string(),
        }
    }
}

impl CommandError {
    pub fn not_found(connection_id: &str) -> Self {
        CommandError {
            error: format!("Connection not found: {}", connection_id),
            error_kind: "connection".to_string(),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Strip credentials from engine connection URLs and password parameters
/// before an error message reaches the UI.
pub(crate) fn sanitize_error(error: &str) -> String {
    let mut sanitized = error.to_string();

    for scheme in ["postgres://", "mysql://", "mongodb://"] {
        if let Some(start) = sanitized.find(scheme) {
            if let Some(at_offset) = sanitized[start..].find('@') {
                let end = start + at_offset + 1;
                sanitized = format!(
                    "{}{}[credentials]@{}",
                    &sanitized[..start],
                    scheme,
                    &sanitized[end..]
                );
            }
        }
    }

    while let Some(start) = sanitized.find("password=") {
        let after = &sanitized[start + 9..];
        let end_offset = after
            .find(|c: char| c.is_whitespace() || c == '&' || c == '"' || c == '\'' || c == ';')
            .unwrap_or(after.len());
        sanitized = format!(
            "{}password=[hidden]{}",
            &sanitized[..start],
            &after[end_offset..]
        );
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_lose_their_credentials() {
        let raw = "connect failed: postgres://admin:hunter2@db:5432/app refused";
        let clean = sanitize_error(raw);
        assert!(!clean.contains("hunter2"));
        assert!(clean.contains("postgres://[credentials]@db:5432/app"));
    }

    #[test]
    fn password_parameters_are_hidden() {
        let clean = sanitize_error("bad option: password=secret&sslmode=disable");
        assert!(!clean.contains("secret"));
        assert!(clean.contains("password=[hidden]"));
    }

    #[test]
    fn command_error_carries_the_kind() {
        let err: CommandError = CoreError::QueryTimeout(2).into();
        assert_eq!(err.error_kind, "queryTimeout");
    }
}
