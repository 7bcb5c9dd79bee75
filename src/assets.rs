use crate::error::BridgeError;
use crate::reflect::ObjectInstance;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Identity record of one persisted object: its project-relative path, the
/// stable guid that survives moves, and a content hash used to re-associate
/// the record when the file moves between reindexes.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub guid: Uuid,
    pub path: String,
    pub type_name: String,
    pub content_hash: Option<String>,
}

/// A persisted object payload. Container assets (e.g. prefab-like node
/// trees) carry their attached component instances in attachment order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredObject {
    Single(ObjectInstance),
    Container { node: ObjectInstance, components: Vec<ObjectInstance> },
}

impl StoredObject {
    pub fn root(&self) -> &ObjectInstance {
        match self {
            StoredObject::Single(object) => object,
            StoredObject::Container { node, .. } => node,
        }
    }

    pub fn root_mut(&mut self) -> &mut ObjectInstance {
        match self {
            StoredObject::Single(object) => object,
            StoredObject::Container { node, .. } => node,
        }
    }
}

/// In-memory index over the persisted addressing domain. Lookups are plain
/// map reads; nothing here blocks on storage once a payload is registered.
pub struct AssetDatabase {
    records: HashMap<Uuid, AssetRecord>,
    by_path: HashMap<String, Uuid>,
    by_hash: HashMap<String, Uuid>,
    objects: HashMap<Uuid, StoredObject>,
}

impl AssetDatabase {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            by_path: HashMap::new(),
            by_hash: HashMap::new(),
            objects: HashMap::new(),
        }
    }

    /// Registers an asset identity with a fresh guid, replacing any record
    /// already claiming the same path.
    pub fn register(&mut self, path: &str, type_name: &str) -> Uuid {
        if let Some(existing) = self.by_path.get(path).copied() {
            return existing;
        }
        let guid = Uuid::new_v4();
        self.insert_record(AssetRecord {
            guid,
            path: path.to_string(),
            type_name: type_name.to_string(),
            content_hash: None,
        });
        guid
    }

    fn insert_record(&mut self, record: AssetRecord) {
        self.by_path.insert(record.path.clone(), record.guid);
        if let Some(hash) = &record.content_hash {
            self.by_hash.insert(hash.clone(), record.guid);
        }
        self.records.insert(record.guid, record);
    }

    /// Attaches (or replaces) the loaded payload for an asset.
    pub fn store_object(&mut self, guid: Uuid, object: StoredObject) {
        self.objects.insert(guid, object);
    }

    pub fn record(&self, guid: Uuid) -> Option<&AssetRecord> {
        self.records.get(&guid)
    }

    pub fn guid_for_path(&self, path: &str) -> Option<Uuid> {
        self.by_path.get(path).copied()
    }

    pub fn path_for_guid(&self, guid: Uuid) -> Option<&str> {
        self.records.get(&guid).map(|record| record.path.as_str())
    }

    /// Cache-backed payload lookup; never touches storage.
    pub fn load(&self, guid: Uuid) -> Option<&StoredObject> {
        self.objects.get(&guid)
    }

    pub fn load_mut(&mut self, guid: Uuid) -> Option<&mut StoredObject> {
        self.objects.get_mut(&guid)
    }

    /// Re-associates identity records against the current set of files. A
    /// file whose content hash matches an existing record keeps that guid
    /// even when its path changed; unknown content at an unknown path gets
    /// a fresh record.
    pub fn reindex<'a, I>(&mut self, files: I)
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        for (path, contents) in files {
            let hash = blake3::hash(contents).to_hex().to_string();
            if let Some(guid) = self.by_hash.get(&hash).copied() {
                let old_path = self.records.get(&guid).map(|r| r.path.clone());
                if old_path.as_deref() != Some(path) {
                    if let Some(old) = old_path {
                        self.by_path.remove(&old);
                    }
                    self.by_path.insert(path.to_string(), guid);
                    if let Some(record) = self.records.get_mut(&guid) {
                        record.path = path.to_string();
                    }
                }
                continue;
            }
            if let Some(guid) = self.by_path.get(path).copied() {
                if let Some(record) = self.records.get_mut(&guid) {
                    if let Some(old_hash) = record.content_hash.take() {
                        self.by_hash.remove(&old_hash);
                    }
                    record.content_hash = Some(hash.clone());
                }
                self.by_hash.insert(hash, guid);
                continue;
            }
            let guid = Uuid::new_v4();
            self.insert_record(AssetRecord {
                guid,
                path: path.to_string(),
                type_name: String::new(),
                content_hash: Some(hash),
            });
        }
    }

    /// Reads one file from disk into the index, hashing its contents.
    pub fn import_file(&mut self, logical_path: &str, disk_path: impl AsRef<Path>) -> Result<Uuid> {
        let disk_path = disk_path.as_ref();
        let bytes = fs::read(disk_path)
            .with_context(|| format!("Reading asset file {}", disk_path.display()))?;
        self.reindex([(logical_path, bytes.as_slice())]);
        Ok(self.by_path[logical_path])
    }

    /// Resolves the persisted-location pair (path, guid) to a single guid.
    /// When both halves are present they must agree; a caller whose two
    /// identifiers have drifted apart gets an error instead of a guess.
    pub fn locate(&self, path: Option<&str>, guid: Option<&str>) -> Result<Uuid, BridgeError> {
        let parsed = match guid {
            Some(raw) => Some(
                Uuid::parse_str(raw)
                    .map_err(|_| BridgeError::validation(format!("malformed asset guid '{raw}'")))?,
            ),
            None => None,
        };
        match (path, parsed) {
            (Some(path), Some(guid)) => {
                let recorded = self
                    .path_for_guid(guid)
                    .ok_or_else(|| BridgeError::not_found(format!("no asset with guid '{guid}'")))?;
                if recorded != path {
                    return Err(BridgeError::validation(format!(
                        "asset path '{path}' and guid '{guid}' disagree (guid resolves to '{recorded}')"
                    )));
                }
                Ok(guid)
            }
            (None, Some(guid)) => {
                if self.records.contains_key(&guid) {
                    Ok(guid)
                } else {
                    Err(BridgeError::not_found(format!("no asset with guid '{guid}'")))
                }
            }
            (Some(path), None) => self
                .guid_for_path(path)
                .ok_or_else(|| BridgeError::not_found(format!("no asset at path '{path}'"))),
            (None, None) => {
                Err(BridgeError::validation("asset reference requires assetPath or guid"))
            }
        }
    }
}

impl Default for AssetDatabase {
    fn default() -> Self {
        Self::new()
    }
}
