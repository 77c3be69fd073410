use std::collections::HashMap;

use keyring::Entry;

use crate::error::{CoreError, CoreResult};

const SERVICE_NAME: &str = "com.quay.client";
const CREDENTIALS_KEY: &str = "connection-passwords";

/// The single keychain entry holding every connection password as one JSON
/// map, keyed by profile id. One entry means one keychain prompt per launch.
fn credentials_entry() -> CoreResult<Entry> {
    Entry::new(SERVICE_NAME, CREDENTIALS_KEY)
        .map_err(|e| CoreError::Storage(format!("failed to open keyring entry: {}", e)))
}

/// Load all passwords from the keychain. Called once at startup to populate
/// the in-memory cache; all later lookups hit the cache.
pub fn load_all_passwords() -> CoreResult<HashMap<String, String>> {
    let entry = credentials_entry()?;
    match entry.get_password() {
        Ok(json) => serde_json::from_str(&json)
            .map_err(|e| CoreError::Storage(format!("failed to parse credentials: {}", e))),
        Err(keyring::Error::NoEntry) => Ok(HashMap::new()),
        Err(e) => Err(CoreError::Storage(format!(
            "failed to retrieve credentials: {}",
            e
        ))),
    }
}

fn save_all_passwords(passwords: &HashMap<String, String>) -> CoreResult<()> {
    let entry = credentials_entry()?;
    if passwords.is_empty() {
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CoreError::Storage(format!(
                "failed to delete credentials: {}",
                e
            ))),
        }
    } else {
        let json = serde_json::to_string(passwords)
            .map_err(|e| CoreError::Storage(format!("failed to serialize credentials: {}", e)))?;
        entry
            .set_password(&json)
            .map_err(|e| CoreError::Storage(format!("failed to store credentials: {}", e)))
    }
}

/// Store a password in the keychain, keeping the provided cache in sync.
pub fn store_password(
    connection_id: &str,
    password: &str,
    cache: &mut HashMap<String, String>,
) -> CoreResult<()> {
    cache.insert(connection_id.to_string(), password.to_string());
    save_all_passwords(cache)
}

/// Remove a password from the keychain, keeping the provided cache in sync.
pub fn delete_password(connection_id: &str, cache: &mut HashMap<String, String>) -> CoreResult<()> {
    cache.remove(connection_id);
    save_all_passwords(cache)
}
