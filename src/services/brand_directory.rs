//! Store and shop classification built once from configuration.

use crate::config::{BrandDescriptor, IngestionConfig, ShopRoute, StoreRoute};
use std::collections::HashMap;

/// Lookup tables keyed by lowercase store name / shop key. Configuration keys
/// arrive lowercased from some sources, so matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct BrandDirectory {
    stores: HashMap<String, StoreRoute>,
    shops: HashMap<String, ShopRoute>,
}

impl BrandDirectory {
    pub fn new(stores: HashMap<String, StoreRoute>, shops: HashMap<String, ShopRoute>) -> Self {
        Self {
            stores: stores
                .into_iter()
                .map(|(name, route)| (normalize(&name), route))
                .collect(),
            shops: shops
                .into_iter()
                .map(|(key, route)| (normalize(&key), route))
                .collect(),
        }
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        Self::new(config.stores.clone(), config.shopify_shops.clone())
    }

    /// `None` means the store is unknown to this warehouse.
    pub fn classify(&self, store_name: &str) -> Option<&StoreRoute> {
        self.stores.get(&normalize(store_name))
    }

    pub fn shop(&self, shop_key: &str) -> Option<&ShopRoute> {
        self.shops.get(&normalize(shop_key))
    }

    fn brands(&self) -> impl Iterator<Item = &BrandDescriptor> {
        self.stores
            .values()
            .filter_map(|route| match route {
                StoreRoute::Brand(brand) => Some(brand),
                _ => None,
            })
            .chain(self.shops.values().map(|shop| &shop.brand))
    }

    /// Where notifications for a brand go: a configured override, else the
    /// brand id itself when brands are identified by email address.
    pub fn notification_address(&self, brand_id: &str) -> Option<String> {
        self.brands()
            .filter(|brand| brand.brand_id == brand_id)
            .find_map(|brand| brand.notification_email.clone())
            .or_else(|| brand_id.contains('@').then(|| brand_id.to_string()))
    }

    pub fn store_count(&self) -> usize {
        self.stores.len()
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> BrandDirectory {
        let mut stores = HashMap::new();
        stores.insert(
            "Acme Shopify".to_string(),
            StoreRoute::Brand(BrandDescriptor {
                brand_id: "acme@example.com".into(),
                brand_name: Some("Acme".into()),
                notification_email: None,
            }),
        );
        stores.insert(
            "House Amazon".to_string(),
            StoreRoute::Marketplace {
                order_source: "amazon".into(),
            },
        );
        stores.insert("Manual Orders".to_string(), StoreRoute::Excluded);

        let mut shops = HashMap::new();
        shops.insert(
            "enduro".to_string(),
            ShopRoute {
                brand: BrandDescriptor {
                    brand_id: "brand-7".into(),
                    brand_name: Some("Enduro".into()),
                    notification_email: Some("ops@enduro.example".into()),
                },
                order_source: "shopify".into(),
                webhook_secret: None,
            },
        );
        BrandDirectory::new(stores, shops)
    }

    #[test]
    fn classification_ignores_case_and_whitespace() {
        let dir = directory();
        assert!(matches!(
            dir.classify(" acme shopify "),
            Some(StoreRoute::Brand(b)) if b.brand_id == "acme@example.com"
        ));
        assert_eq!(dir.classify("MANUAL ORDERS"), Some(&StoreRoute::Excluded));
        assert!(dir.classify("Someone Else").is_none());
        assert!(dir.shop("Enduro").is_some());
    }

    #[test]
    fn notification_address_prefers_override() {
        let dir = directory();
        assert_eq!(
            dir.notification_address("brand-7").as_deref(),
            Some("ops@enduro.example")
        );
        assert_eq!(
            dir.notification_address("acme@example.com").as_deref(),
            Some("acme@example.com")
        );
        assert_eq!(dir.notification_address("brand-unknown"), None);
    }
}
