//! Catalog lookups shared by the cart and checkout services.

use common::{ProductId, VariantId};
use domain::CatalogVariant;
use store::StoreTx;

use crate::error::{CommerceError, Result};

/// Resolves a client-supplied id to a sellable variant.
///
/// Clients sometimes send a product id where a variant id is expected, so
/// the id is tried as a variant first and then as a product, in which case
/// the product's oldest active variant is used.
pub async fn resolve_variant<T: StoreTx>(tx: &mut T, id: VariantId) -> Result<Option<CatalogVariant>> {
    if let Some(found) = tx.get_variant(id).await? {
        return Ok(Some(found));
    }

    let product_id = ProductId::from_uuid(id.as_uuid());
    let fallback = tx.first_active_variant_of_product(product_id).await?;
    if let Some(found) = &fallback {
        tracing::debug!(
            %product_id,
            variant_id = %found.variant.id,
            "resolved product id to its first active variant"
        );
    }
    Ok(fallback)
}

/// Like [`resolve_variant`], failing with `NotFound` when neither lookup matches.
pub async fn require_variant<T: StoreTx>(tx: &mut T, id: VariantId) -> Result<CatalogVariant> {
    resolve_variant(tx, id)
        .await?
        .ok_or_else(|| CommerceError::not_found("ProductVariant", id))
}

/// Fails with `ProductUnavailable` unless the variant and its product are active.
pub fn ensure_purchasable(catalog: &CatalogVariant) -> Result<()> {
    if catalog.is_purchasable() {
        Ok(())
    } else {
        Err(CommerceError::ProductUnavailable(catalog.product.name.clone()))
    }
}

/// Fails with `InsufficientStock` when `requested` units cannot be sold.
pub fn ensure_stock(catalog: &CatalogVariant, requested: i64) -> Result<()> {
    if catalog.can_fulfill(requested) {
        Ok(())
    } else {
        tracing::warn!(
            variant_id = %catalog.variant.id,
            requested,
            available = catalog.variant.inventory_quantity,
            "insufficient stock"
        );
        Err(CommerceError::InsufficientStock {
            product_name: catalog.product.name.clone(),
            available: catalog.variant.inventory_quantity.max(0),
        })
    }
}
