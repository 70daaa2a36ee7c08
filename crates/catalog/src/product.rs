use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storedesk_core::{
    CategoryId, ColorId, DomainError, DomainResult, Entity, Money, ProductId, SizeId, StoreId,
    Timestamped,
};
use storedesk_inventory::StockChange;

/// Size-specific stock record of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeVariant {
    pub size_id: SizeId,
    pub name: String,
    pub stock: u32,
}

/// Colour-specific stock record of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVariant {
    pub color_id: ColorId,
    pub name: String,
    /// Hex colour code (`#rgb` or `#rrggbb`).
    pub value: String,
    pub stock: u32,
}

/// Variants picked by a buyer (or recorded on an order line).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantSelection {
    pub size_id: Option<SizeId>,
    pub color_id: Option<ColorId>,
}

impl VariantSelection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn size(size_id: SizeId) -> Self {
        Self {
            size_id: Some(size_id),
            color_id: None,
        }
    }

    pub fn color(color_id: ColorId) -> Self {
        Self {
            size_id: None,
            color_id: Some(color_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size_id.is_none() && self.color_id.is_none()
    }
}

/// The stock record(s) a selection resolves to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockTarget {
    Base,
    Size(SizeId),
    Color(ColorId),
    SizeAndColor(SizeId, ColorId),
}

impl StockTarget {
    pub fn size_id(&self) -> Option<SizeId> {
        match self {
            StockTarget::Size(s) | StockTarget::SizeAndColor(s, _) => Some(*s),
            _ => None,
        }
    }

    pub fn color_id(&self) -> Option<ColorId> {
        match self {
            StockTarget::Color(c) | StockTarget::SizeAndColor(_, c) => Some(*c),
            _ => None,
        }
    }
}

/// Catalog product: base inventory unit, optionally split into variants.
///
/// # Stock semantics
///
/// One rule is used for every view of stock:
/// - no variants: the base stock;
/// - size and colour selected: the scarcer of the two variant records;
/// - one dimension selected: that variant's stock;
/// - nothing selected while variants exist: for each dimension that has
///   variants, the sum of its records; the smallest of those sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub price: Money,
    pub is_featured: bool,
    pub is_archived: bool,
    pub stock: u32,
    pub sizes: Vec<SizeVariant>,
    pub colors: Vec<ColorVariant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// A variant-less product; attach variants with [`Product::with_sizes`] /
    /// [`Product::with_colors`] before validating.
    pub fn new(
        id: ProductId,
        store_id: StoreId,
        name: impl Into<String>,
        price: Money,
        stock: u32,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            store_id,
            name: name.into(),
            category_id: None,
            price,
            is_featured: false,
            is_archived: false,
            stock,
            sizes: Vec::new(),
            colors: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn with_sizes(mut self, sizes: Vec<SizeVariant>) -> Self {
        self.sizes = sizes;
        self
    }

    pub fn with_colors(mut self, colors: Vec<ColorVariant>) -> Self {
        self.colors = colors;
        self
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if self.price.is_zero() {
            return Err(DomainError::validation("price must be positive"));
        }

        let mut seen_sizes = HashSet::new();
        for size in &self.sizes {
            if !seen_sizes.insert(size.size_id) {
                return Err(DomainError::validation(format!(
                    "size {} listed twice",
                    size.size_id
                )));
            }
        }

        let mut seen_colors = HashSet::new();
        for color in &self.colors {
            if !seen_colors.insert(color.color_id) {
                return Err(DomainError::validation(format!(
                    "color {} listed twice",
                    color.color_id
                )));
            }
            if !is_hex_color(&color.value) {
                return Err(DomainError::validation(format!(
                    "color value '{}' is not a hex code",
                    color.value
                )));
            }
        }

        Ok(())
    }

    pub fn has_variants(&self) -> bool {
        !self.sizes.is_empty() || !self.colors.is_empty()
    }

    /// Archived products stay on past orders but cannot be bought.
    pub fn is_sellable(&self) -> bool {
        !self.is_archived
    }

    pub fn size(&self, size_id: SizeId) -> Option<&SizeVariant> {
        self.sizes.iter().find(|s| s.size_id == size_id)
    }

    pub fn color(&self, color_id: ColorId) -> Option<&ColorVariant> {
        self.colors.iter().find(|c| c.color_id == color_id)
    }

    /// Resolve a selection to the record(s) it draws stock from.
    ///
    /// An empty selection resolves to the base record.
    pub fn stock_target(&self, selection: VariantSelection) -> DomainResult<StockTarget> {
        if let Some(size_id) = selection.size_id {
            if self.size(size_id).is_none() {
                return Err(DomainError::validation(format!(
                    "product {} has no size {size_id}",
                    self.id
                )));
            }
        }
        if let Some(color_id) = selection.color_id {
            if self.color(color_id).is_none() {
                return Err(DomainError::validation(format!(
                    "product {} has no color {color_id}",
                    self.id
                )));
            }
        }

        Ok(match (selection.size_id, selection.color_id) {
            (Some(s), Some(c)) => StockTarget::SizeAndColor(s, c),
            (Some(s), None) => StockTarget::Size(s),
            (None, Some(c)) => StockTarget::Color(c),
            (None, None) => StockTarget::Base,
        })
    }

    /// Buyers must pick a variant in every dimension the product has.
    pub fn require_complete_selection(&self, selection: VariantSelection) -> DomainResult<()> {
        if !self.sizes.is_empty() && selection.size_id.is_none() {
            return Err(DomainError::validation(format!(
                "a size must be selected for {}",
                self.name
            )));
        }
        if !self.colors.is_empty() && selection.color_id.is_none() {
            return Err(DomainError::validation(format!(
                "a color must be selected for {}",
                self.name
            )));
        }
        Ok(())
    }

    /// Stock available for a selection (see the type-level docs).
    pub fn available_stock(&self, selection: VariantSelection) -> DomainResult<u32> {
        if selection.is_empty() {
            return Ok(self.displayed_stock());
        }
        Ok(match self.stock_target(selection)? {
            StockTarget::Base => self.stock,
            StockTarget::Size(s) => self.size_stock(s),
            StockTarget::Color(c) => self.color_stock(c),
            StockTarget::SizeAndColor(s, c) => self.size_stock(s).min(self.color_stock(c)),
        })
    }

    /// Stock shown in listings and detail views.
    pub fn displayed_stock(&self) -> u32 {
        if !self.has_variants() {
            return self.stock;
        }
        let sizes = (!self.sizes.is_empty())
            .then(|| self.sizes.iter().map(|s| s.stock).fold(0u32, u32::saturating_add));
        let colors = (!self.colors.is_empty())
            .then(|| self.colors.iter().map(|c| c.stock).fold(0u32, u32::saturating_add));
        sizes.into_iter().chain(colors).min().unwrap_or(self.stock)
    }

    /// Remove `quantity` units from the selected record(s), flooring at zero.
    ///
    /// When both a size and a colour are selected both records are decremented
    /// and the returned change reflects the scarcer of the two.
    pub fn decrement(
        &mut self,
        selection: VariantSelection,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> DomainResult<StockChange> {
        let change = match self.stock_target(selection)? {
            StockTarget::Base => {
                let change = StockChange::decrement(self.stock, quantity);
                self.stock = change.new;
                change
            }
            StockTarget::Size(s) => self.decrement_size(s, quantity),
            StockTarget::Color(c) => self.decrement_color(c, quantity),
            StockTarget::SizeAndColor(s, c) => {
                let size = self.decrement_size(s, quantity);
                let color = self.decrement_color(c, quantity);
                StockChange::combined(size, color)
            }
        };
        self.updated_at = at;
        Ok(change)
    }

    /// Overwrite one stock record with an absolute value.
    ///
    /// Exactly one record must be addressed: base, one size, or one colour.
    pub fn set_stock(
        &mut self,
        selection: VariantSelection,
        stock: u32,
        at: DateTime<Utc>,
    ) -> DomainResult<StockChange> {
        let change = match self.stock_target(selection)? {
            StockTarget::Base => {
                let change = StockChange::set(self.stock, stock);
                self.stock = stock;
                change
            }
            StockTarget::Size(s) => {
                let variant = self
                    .sizes
                    .iter_mut()
                    .find(|v| v.size_id == s)
                    .ok_or_else(|| DomainError::not_found("size variant"))?;
                let change = StockChange::set(variant.stock, stock);
                variant.stock = stock;
                change
            }
            StockTarget::Color(c) => {
                let variant = self
                    .colors
                    .iter_mut()
                    .find(|v| v.color_id == c)
                    .ok_or_else(|| DomainError::not_found("color variant"))?;
                let change = StockChange::set(variant.stock, stock);
                variant.stock = stock;
                change
            }
            StockTarget::SizeAndColor(..) => {
                return Err(DomainError::validation(
                    "select either a size or a color to set stock, not both",
                ));
            }
        };
        self.updated_at = at;
        Ok(change)
    }

    fn size_stock(&self, size_id: SizeId) -> u32 {
        self.size(size_id).map(|s| s.stock).unwrap_or(0)
    }

    fn color_stock(&self, color_id: ColorId) -> u32 {
        self.color(color_id).map(|c| c.stock).unwrap_or(0)
    }

    fn decrement_size(&mut self, size_id: SizeId, quantity: u32) -> StockChange {
        match self.sizes.iter_mut().find(|v| v.size_id == size_id) {
            Some(variant) => {
                let change = StockChange::decrement(variant.stock, quantity);
                variant.stock = change.new;
                change
            }
            None => StockChange::set(0, 0),
        }
    }

    fn decrement_color(&mut self, color_id: ColorId, quantity: u32) -> StockChange {
        match self.colors.iter_mut().find(|v| v.color_id == color_id) {
            Some(variant) => {
                let change = StockChange::decrement(variant.stock, quantity);
                variant.stock = change.new;
                change
            }
            None => StockChange::set(0, 0),
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Timestamped for Product {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
