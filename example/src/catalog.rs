//! Deterministic sample catalog fed to the grid.

use std::sync::Arc;

use rand::{Rng, SeedableRng};

use super_masonry::{FieldValue, Searchable, headless::HeadlessItem, item::ItemKey};

const CATEGORIES: [&str; 4] = ["lighting", "seating", "storage", "textiles"];
const NOUNS: [&str; 8] = [
    "lamp", "chair", "shelf", "rug", "stool", "cabinet", "pendant", "throw",
];

#[derive(Debug, Clone)]
pub struct Product {
    pub title: String,
    pub category: &'static str,
    pub price: f64,
}

impl Searchable for Product {
    fn field(&self, property: &str) -> Option<FieldValue> {
        match property {
            "title" => Some(FieldValue::Text(self.title.clone())),
            "category" => Some(FieldValue::Text(self.category.to_string())),
            "price" => Some(FieldValue::Number(self.price)),
            _ => None,
        }
    }
}

pub fn generate(count: usize, seed: u64) -> Vec<Arc<HeadlessItem<Product>>> {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(seed);
    (0..count)
        .map(|index| {
            let noun = NOUNS[rng.random_range(0..NOUNS.len())];
            let product = Product {
                title: format!("{} {noun}", ["Oak", "Linen", "Brass", "Walnut"][index % 4]),
                category: CATEGORIES[rng.random_range(0..CATEGORIES.len())],
                price: f64::from(rng.random_range(10..1000_u32)),
            };
            let height = rng.random_range(120.0..400.0_f32);
            Arc::new(HeadlessItem::new(ItemKey(index as u64), product, height))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super_masonry::item::ItemHandle;

    use super::*;

    fn summary(items: &[Arc<HeadlessItem<Product>>]) -> Vec<(String, f64, f32)> {
        items
            .iter()
            .map(|item| {
                let size = item.measure().unwrap();
                (item.data().title.clone(), item.data().price, size.height.0)
            })
            .collect()
    }

    #[test]
    fn test_same_seed_same_catalog() {
        assert_eq!(summary(&generate(12, 7)), summary(&generate(12, 7)));
        assert_ne!(summary(&generate(12, 7)), summary(&generate(12, 8)));
    }

    #[test]
    fn test_generated_values_stay_in_range() {
        let items = generate(50, 42);
        assert_eq!(items.len(), 50);
        for (index, item) in items.iter().enumerate() {
            assert_eq!(item.key(), ItemKey(index as u64));
            let product = item.data();
            assert!((10.0..1000.0).contains(&product.price));
            assert!(CATEGORIES.contains(&product.category));
            let height = item.measure().unwrap().height.0;
            assert!((120.0..400.0).contains(&height));
        }
    }
}
