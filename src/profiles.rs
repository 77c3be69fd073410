use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::credentials;
use crate::error::CoreResult;
use crate::models::{ConnectionGroup, ConnectionProfile};
use crate::storage::AppStorage;

/// Owns the persisted connection profiles and groups. Passwords never touch
/// the profile document: they live in the OS keychain and are merged into an
/// in-memory cache at load. Keychain trouble degrades to session-only
/// passwords with a warning, never a hard failure.
pub struct ProfileStore {
    profiles: Mutex<HashMap<String, ConnectionProfile>>,
    groups: Mutex<Vec<ConnectionGroup>>,
    passwords: Mutex<HashMap<String, String>>,
    storage: Arc<AppStorage>,
    use_keychain: bool,
}

impl ProfileStore {
    pub fn load(storage: Arc<AppStorage>, use_keychain: bool) -> Self {
        let profiles: HashMap<String, ConnectionProfile> = storage
            .load_profiles()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        let groups = storage.load_groups();

        let passwords = if use_keychain {
            match credentials::load_all_passwords() {
                Ok(passwords) => passwords,
                Err(e) => {
                    log::warn!("failed to load passwords from keychain: {}", e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        ProfileStore {
            profiles: Mutex::new(profiles),
            groups: Mutex::new(groups),
            passwords: Mutex::new(passwords),
            storage,
            use_keychain,
        }
    }

    /// Profile with its password restored from the credential cache.
    pub fn get(&self, connection_id: &str) -> Option<ConnectionProfile> {
        let mut profile = self.profiles.lock().unwrap().get(connection_id).cloned()?;
        if let Some(password) = self.passwords.lock().unwrap().get(connection_id) {
            profile.password = password.clone();
        }
        Some(profile)
    }

    pub fn list(&self) -> Vec<ConnectionProfile> {
        let passwords = self.passwords.lock().unwrap();
        let mut profiles: Vec<ConnectionProfile> = self
            .profiles
            .lock()
            .unwrap()
            .values()
            .cloned()
            .map(|mut p| {
                if let Some(password) = passwords.get(&p.id) {
                    p.password = password.clone();
                }
                p
            })
            .collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        profiles
    }

    pub fn save(&self, mut profile: ConnectionProfile) -> CoreResult<()> {
        let password = std::mem::take(&mut profile.password);
        if !password.is_empty() {
            let mut passwords = self.passwords.lock().unwrap();
            if self.use_keychain {
                if let Err(e) = credentials::store_password(&profile.id, &password, &mut passwords)
                {
                    log::warn!("failed to store password in keychain: {}", e);
                }
            } else {
                passwords.insert(profile.id.clone(), password);
            }
        }

        {
            let mut profiles = self.profiles.lock().unwrap();
            profiles.insert(profile.id.clone(), profile);
        }
        self.persist_profiles()
    }

    pub fn delete(&self, connection_id: &str) -> CoreResult<bool> {
        let removed = self
            .profiles
            .lock()
            .unwrap()
            .remove(connection_id)
            .is_some();
        if removed {
            {
                let mut passwords = self.passwords.lock().unwrap();
                if self.use_keychain {
                    if let Err(e) = credentials::delete_password(connection_id, &mut passwords) {
                        log::warn!("failed to remove password from keychain: {}", e);
                    }
                } else {
                    passwords.remove(connection_id);
                }
            }
            self.persist_profiles()?;
        }
        Ok(removed)
    }

    fn persist_profiles(&self) -> CoreResult<()> {
        // Passwords were already stripped before insertion.
        let profiles: Vec<ConnectionProfile> =
            self.profiles.lock().unwrap().values().cloned().collect();
        self.storage.save_profiles(&profiles)
    }

    pub fn list_groups(&self) -> Vec<ConnectionGroup> {
        self.groups.lock().unwrap().clone()
    }

    pub fn save_group(&self, group: ConnectionGroup) -> CoreResult<()> {
        {
            let mut groups = self.groups.lock().unwrap();
            match groups.iter_mut().find(|g| g.id == group.id) {
                Some(existing) => *existing = group,
                None => groups.push(group),
            }
        }
        self.persist_groups()
    }

    pub fn delete_group(&self, group_id: &str) -> CoreResult<bool> {
        let removed = {
            let mut groups = self.groups.lock().unwrap();
            let before = groups.len();
            groups.retain(|g| g.id != group_id);
            before != groups.len()
        };
        if removed {
            self.persist_groups()?;
        }
        Ok(removed)
    }

    fn persist_groups(&self) -> CoreResult<()> {
        let groups = self.groups.lock().unwrap().clone();
        self.storage.save_groups(&groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EngineKind;
    use tempfile::tempdir;

    fn store() -> (ProfileStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(AppStorage::new(dir.path()).unwrap());
        (ProfileStore::load(storage, false), dir)
    }

    fn profile(id: &str, password: &str) -> ConnectionProfile {
        ConnectionProfile {
            id: id.into(),
            name: format!("conn-{}", id),
            engine: EngineKind::Postgres,
            host: "localhost".into(),
            port: 5432,
            username: "quay".into(),
            password: password.into(),
            database: "app".into(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn passwords_stay_out_of_the_persisted_document() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(AppStorage::new(dir.path()).unwrap());
        let store = ProfileStore::load(storage.clone(), false);
        store.save(profile("c1", "hunter2")).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("connections.json")).unwrap();
        assert!(!raw.contains("hunter2"));
        // But the in-memory view still carries it for connect calls.
        assert_eq!(store.get("c1").unwrap().password, "hunter2");
    }

    #[test]
    fn delete_removes_profile_and_password() {
        let (store, _dir) = store();
        store.save(profile("c1", "secret")).unwrap();
        assert!(store.delete("c1").unwrap());
        assert!(store.get("c1").is_none());
        assert!(!store.delete("c1").unwrap());
    }

    #[test]
    fn list_is_sorted_by_name() {
        let (store, _dir) = store();
        store.save(profile("b", "")).unwrap();
        store.save(profile("a", "")).unwrap();
        let names: Vec<String> = store.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["conn-a", "conn-b"]);
    }

    #[test]
    fn groups_round_trip() {
        let (store, _dir) = store();
        store
            .save_group(ConnectionGroup {
                id: "g1".into(),
                name: "production".into(),
                connection_ids: vec!["c1".into()],
            })
            .unwrap();
        assert_eq!(store.list_groups().len(), 1);
        assert!(store.delete_group("g1").unwrap());
        assert!(store.list_groups().is_empty());
    }
}
