use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use shared::{
    domain::{AttributeValue, ItemId},
    protocol::MenuEntry,
};
use tracing::{info, warn};

use crate::{error::CatalogLoadError, OptimizerService};

const MEDIA_ATTRIBUTE_KEYS: [&str; 2] = ["image", "image_url"];

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub name: ItemId,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub media: Option<String>,
}

impl CatalogItem {
    pub fn new(name: impl Into<ItemId>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            media: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    fn from_entry(index: usize, entry: MenuEntry) -> Result<Self, CatalogLoadError> {
        if entry.item.trim().is_empty() {
            return Err(CatalogLoadError::EmptyItemName { index });
        }
        let name = ItemId::new(entry.item);

        let mut attributes = BTreeMap::new();
        let mut media = None;
        for (key, value) in entry.attributes {
            let value = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::Bool(flag) => AttributeValue::Flag(flag),
                serde_json::Value::String(text) => AttributeValue::Text(text),
                serde_json::Value::Number(number) => match number.as_f64() {
                    Some(number) => AttributeValue::Number(number),
                    None => {
                        return Err(CatalogLoadError::UnsupportedAttribute {
                            item: name,
                            attribute: key,
                        })
                    }
                },
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(CatalogLoadError::UnsupportedAttribute {
                        item: name,
                        attribute: key,
                    })
                }
            };

            if media.is_none() && MEDIA_ATTRIBUTE_KEYS.contains(&key.as_str()) {
                if let AttributeValue::Text(reference) = &value {
                    media = Some(reference.clone());
                    continue;
                }
            }
            attributes.insert(key, value);
        }

        Ok(Self {
            name,
            attributes,
            media,
        })
    }
}

/// Ordered, immutable list of selectable items with an identifier index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    index: HashMap<ItemId, usize>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Result<Self, CatalogLoadError> {
        let mut index = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            if index.insert(item.name.clone(), position).is_some() {
                return Err(CatalogLoadError::DuplicateItem(item.name.clone()));
            }
        }
        Ok(Self { items, index })
    }

    pub fn from_entries(entries: Vec<MenuEntry>) -> Result<Self, CatalogLoadError> {
        let items = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| CatalogItem::from_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(items)
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.index.get(id).map(|position| &self.items[*position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct CatalogLoader {
    service: Arc<dyn OptimizerService>,
}

impl CatalogLoader {
    pub fn new(service: Arc<dyn OptimizerService>) -> Self {
        Self { service }
    }

    /// Fetches `/menu` once. Every call issues a fresh request.
    pub async fn load_catalog(&self) -> Result<Catalog, CatalogLoadError> {
        let entries = self.service.fetch_menu().await.map_err(|err| {
            warn!(%err, "catalog: menu fetch failed");
            err
        })?;
        let catalog = Catalog::from_entries(entries).map_err(|err| {
            warn!(%err, "catalog: menu payload rejected");
            err
        })?;
        info!(items = catalog.len(), "catalog: loaded");
        Ok(catalog)
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
