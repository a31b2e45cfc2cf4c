use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Platform {
    pub id: u64,
    pub slug: String,
    pub display_name: String,
    #[serde(default)]
    pub rom_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    /// Numeric for library collections, an opaque string for virtual ones.
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub rom_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub fs_name: String,
    pub platform_slug: String,
    #[serde(default)]
    pub fs_size_bytes: u64,
    /// Multi-file entries are served as a zip and unpacked on the device.
    #[serde(default)]
    pub multi: bool,
}

impl Item {
    pub fn is_archive(&self) -> bool {
        self.multi
    }

    pub fn size_label(&self) -> String {
        let bytes = self.fs_size_bytes as f64;
        if bytes >= 1024.0 * 1024.0 * 1024.0 {
            format!("{:.1} GB", bytes / 1024.0 / 1024.0 / 1024.0)
        } else if bytes >= 1024.0 * 1024.0 {
            format!("{:.1} MB", bytes / 1024.0 / 1024.0)
        } else {
            format!("{:.0} KB", bytes / 1024.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub username: String,
    #[serde(default)]
    pub role: String,
}

/// What a fetch-items worker asks the server for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemScope {
    Platform(u64),
    Collection(String),
    VirtualCollection(String),
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_ids_accept_numbers_and_strings() {
        let real: Collection = serde_json::from_str(r#"{"id": 12, "name": "Favourites"}"#).unwrap();
        assert_eq!(real.id, "12");
        assert!(!real.is_virtual);

        let virt: Collection =
            serde_json::from_str(r#"{"id": "recent-nes", "name": "Recent", "is_virtual": true}"#).unwrap();
        assert_eq!(virt.id, "recent-nes");
        assert!(virt.is_virtual);
    }

    #[test]
    fn item_ignores_unknown_fields() {
        let item: Item = serde_json::from_str(
            r#"{"id": 3, "name": "Metroid", "fs_name": "Metroid (USA).nes", "sha1_hash": "abc",
                "platform_slug": "nes", "fs_size_bytes": 131088, "multi": false}"#,
        )
        .unwrap();
        assert_eq!(item.fs_size_bytes, 131088);
        assert!(!item.is_archive());
        assert_eq!(item.size_label(), "128 KB");
    }

    #[test]
    fn platform_defaults_rom_count() {
        let p: Platform = serde_json::from_str(
            r#"{"id": 1, "slug": "snes", "name": "SNES", "display_name": "Super Nintendo"}"#,
        )
        .unwrap();
        assert_eq!(p.display_name, "Super Nintendo");
        assert_eq!(p.rom_count, 0);
    }
}
