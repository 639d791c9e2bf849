#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Font,
    Image,
}

/// Named binary resource registered once per run and shared read-only by
/// every group's document afterwards.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
    pub data: Vec<u8>,
}

impl Asset {
    pub fn new(name: impl Into<String>, kind: AssetKind, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            data,
        }
    }

    pub fn bytes_len(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    assets: Vec<Asset>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an asset; a later asset under the same name and kind
    /// replaces the earlier one.
    pub fn add(&mut self, asset: Asset) {
        self.assets
            .retain(|existing| !(existing.name == asset.name && existing.kind == asset.kind));
        self.assets.push(asset);
    }

    pub fn get(&self, name: &str, kind: AssetKind) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|asset| asset.kind == kind && asset.name == name)
    }

    pub fn image(&self, name: &str) -> Option<&Asset> {
        self.get(name, AssetKind::Image)
    }

    pub fn fonts(&self) -> impl Iterator<Item = &Asset> {
        self.assets
            .iter()
            .filter(|asset| asset.kind == AssetKind::Font)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_and_kind_replaces_earlier_registration() {
        let mut store = AssetStore::new();
        store.add(Asset::new("banner-main", AssetKind::Image, vec![1]));
        store.add(Asset::new("banner-main", AssetKind::Image, vec![2, 3]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.image("banner-main").unwrap().bytes_len(), 2);
    }

    #[test]
    fn kinds_do_not_shadow_each_other() {
        let mut store = AssetStore::new();
        store.add(Asset::new("noto", AssetKind::Font, vec![1]));
        store.add(Asset::new("noto", AssetKind::Image, vec![2]));
        assert_eq!(store.len(), 2);
        assert!(store.get("noto", AssetKind::Font).is_some());
    }
}
