//! Client/server cart merge.
//!
//! The merge never loses items: a quantity present on both sides resolves to
//! the larger of the two, lines the client does not mention are left alone,
//! and stock clamping is the only thing that can lower a quantity.

use common::{CartLineId, Properties, VariantId};

use super::MAX_LINE_QUANTITY;
use super::model::CartLine;
use crate::catalog::CatalogVariant;

/// A client-held line whose variant has already been resolved against the catalog.
#[derive(Debug, Clone)]
pub struct LocalLine {
    pub catalog: CatalogVariant,
    pub quantity: u32,
    /// `None` keeps whatever properties the server line already has.
    pub properties: Option<Properties>,
}

/// A single write produced by the merge.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeAction {
    /// Insert or update the line for this variant.
    Upsert {
        variant_id: VariantId,
        quantity: u32,
        properties: Properties,
    },
    /// The merged quantity reached zero; delete the server line.
    Remove { line_id: CartLineId },
}

/// Output of [`merge_lines`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    pub actions: Vec<MergeAction>,
    /// Variants whose merged quantity was lowered to the available stock.
    pub clamped: Vec<VariantId>,
    /// Variants skipped because the variant or its product is inactive.
    pub skipped: Vec<VariantId>,
}

impl MergePlan {
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Merges resolved local lines into the server lines.
///
/// Local lines for the same variant are collapsed first (largest quantity
/// wins, last provided properties win). The plan only contains writes that
/// change something, so merging the same payload twice produces an empty
/// plan the second time.
pub fn merge_lines(server: &[CartLine], local: &[LocalLine]) -> MergePlan {
    let mut plan = MergePlan::default();
    let mut collapsed: Vec<LocalLine> = Vec::with_capacity(local.len());

    for line in local {
        if !line.catalog.is_purchasable() {
            if !plan.skipped.contains(&line.catalog.variant.id) {
                plan.skipped.push(line.catalog.variant.id);
            }
            continue;
        }
        match collapsed
            .iter_mut()
            .find(|c| c.catalog.variant.id == line.catalog.variant.id)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.max(line.quantity);
                if line.properties.is_some() {
                    existing.properties = line.properties.clone();
                }
            }
            None => collapsed.push(line.clone()),
        }
    }

    for line in collapsed {
        let variant_id = line.catalog.variant.id;
        let server_line = server.iter().find(|s| s.variant_id == variant_id);
        let server_qty = server_line.map_or(0, |s| s.quantity);

        let wanted = line.quantity.max(server_qty);
        let stocked = line.catalog.clamp_to_stock(wanted);
        if stocked < wanted {
            plan.clamped.push(variant_id);
        }
        let merged = stocked.min(MAX_LINE_QUANTITY);

        if merged == 0 {
            if let Some(existing) = server_line {
                plan.actions.push(MergeAction::Remove {
                    line_id: existing.id,
                });
            }
            continue;
        }

        let properties = match (&line.properties, server_line) {
            (Some(props), _) => props.clone(),
            (None, Some(existing)) => existing.properties.clone(),
            (None, None) => Properties::new(),
        };

        let unchanged = server_line
            .is_some_and(|existing| existing.quantity == merged && existing.properties == properties);
        if !unchanged {
            plan.actions.push(MergeAction::Upsert {
                variant_id,
                quantity: merged,
                properties,
            });
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::CartId;

    use super::*;
    use crate::catalog::InventoryPolicy;
    use crate::catalog::fixtures::catalog_variant;

    fn server_line(cart_id: CartId, variant_id: VariantId, quantity: u32) -> CartLine {
        CartLine::new(cart_id, variant_id, quantity, Properties::new(), Utc::now()).unwrap()
    }

    fn local(catalog: &CatalogVariant, quantity: u32) -> LocalLine {
        LocalLine {
            catalog: catalog.clone(),
            quantity,
            properties: None,
        }
    }

    fn upserted_quantity(plan: &MergePlan, variant_id: VariantId) -> Option<u32> {
        plan.actions.iter().find_map(|a| match a {
            MergeAction::Upsert {
                variant_id: v,
                quantity,
                ..
            } if *v == variant_id => Some(*quantity),
            _ => None,
        })
    }

    /// Applies a plan to an in-memory line list, the way the store would.
    fn apply(cart_id: CartId, server: &mut Vec<CartLine>, plan: &MergePlan) {
        for action in &plan.actions {
            match action {
                MergeAction::Upsert {
                    variant_id,
                    quantity,
                    properties,
                } => match server.iter_mut().find(|l| l.variant_id == *variant_id) {
                    Some(line) => {
                        line.quantity = *quantity;
                        line.properties = properties.clone();
                    }
                    None => {
                        let mut line = server_line(cart_id, *variant_id, *quantity);
                        line.properties = properties.clone();
                        server.push(line);
                    }
                },
                MergeAction::Remove { line_id } => server.retain(|l| l.id != *line_id),
            }
        }
    }

    #[test]
    fn larger_local_quantity_wins() {
        let cart_id = CartId::new();
        let v = catalog_variant(1000, 10, InventoryPolicy::Deny);
        let server = vec![server_line(cart_id, v.variant.id, 2)];

        let plan = merge_lines(&server, &[local(&v, 5)]);
        assert_eq!(upserted_quantity(&plan, v.variant.id), Some(5));
    }

    #[test]
    fn larger_server_quantity_is_kept() {
        let cart_id = CartId::new();
        let v = catalog_variant(1000, 10, InventoryPolicy::Deny);
        let server = vec![server_line(cart_id, v.variant.id, 2)];

        let plan = merge_lines(&server, &[local(&v, 1)]);
        assert!(plan.is_noop(), "server already holds max(2, 1)");
    }

    #[test]
    fn clamps_to_stock_under_deny() {
        let v = catalog_variant(1000, 3, InventoryPolicy::Deny);
        let plan = merge_lines(&[], &[local(&v, 8)]);
        assert_eq!(upserted_quantity(&plan, v.variant.id), Some(3));
        assert_eq!(plan.clamped, vec![v.variant.id]);
    }

    #[test]
    fn allow_policy_is_not_clamped_to_stock() {
        let v = catalog_variant(1000, 0, InventoryPolicy::Allow);
        let plan = merge_lines(&[], &[local(&v, 8)]);
        assert_eq!(upserted_quantity(&plan, v.variant.id), Some(8));
    }

    #[test]
    fn zero_stock_drops_the_line() {
        let cart_id = CartId::new();
        let v = catalog_variant(1000, 0, InventoryPolicy::Deny);
        let existing = server_line(cart_id, v.variant.id, 2);

        let plan = merge_lines(std::slice::from_ref(&existing), &[local(&v, 1)]);
        assert_eq!(
            plan.actions,
            vec![MergeAction::Remove {
                line_id: existing.id
            }]
        );

        let plan = merge_lines(&[], &[local(&v, 1)]);
        assert!(plan.is_noop());
    }

    #[test]
    fn inactive_variants_are_skipped() {
        let mut v = catalog_variant(1000, 10, InventoryPolicy::Deny);
        v.variant.is_active = false;
        let plan = merge_lines(&[], &[local(&v, 1)]);
        assert!(plan.is_noop());
        assert_eq!(plan.skipped, vec![v.variant.id]);
    }

    #[test]
    fn unmentioned_server_lines_are_preserved() {
        let cart_id = CartId::new();
        let kept = catalog_variant(1000, 10, InventoryPolicy::Deny);
        let added = catalog_variant(500, 10, InventoryPolicy::Deny);
        let mut server = vec![server_line(cart_id, kept.variant.id, 4)];

        let plan = merge_lines(&server, &[local(&added, 1)]);
        apply(cart_id, &mut server, &plan);

        assert_eq!(server.len(), 2);
        let kept_line = server
            .iter()
            .find(|l| l.variant_id == kept.variant.id)
            .unwrap();
        assert_eq!(kept_line.quantity, 4);
    }

    #[test]
    fn duplicate_local_lines_collapse_to_max() {
        let v = catalog_variant(1000, 10, InventoryPolicy::Deny);
        let plan = merge_lines(&[], &[local(&v, 2), local(&v, 6), local(&v, 3)]);
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(upserted_quantity(&plan, v.variant.id), Some(6));
    }

    #[test]
    fn quantity_is_capped_at_line_maximum() {
        let v = catalog_variant(1000, 1_000, InventoryPolicy::Deny);
        let plan = merge_lines(&[], &[local(&v, 250)]);
        assert_eq!(upserted_quantity(&plan, v.variant.id), Some(MAX_LINE_QUANTITY));
    }

    #[test]
    fn local_properties_replace_server_properties() {
        let cart_id = CartId::new();
        let v = catalog_variant(1000, 10, InventoryPolicy::Deny);
        let mut existing = server_line(cart_id, v.variant.id, 2);
        existing.properties.insert("color", "red").unwrap();

        let mut props = Properties::new();
        props.insert("color", "blue").unwrap();
        let line = LocalLine {
            catalog: v.clone(),
            quantity: 2,
            properties: Some(props.clone()),
        };

        let plan = merge_lines(&[existing], &[line]);
        assert_eq!(
            plan.actions,
            vec![MergeAction::Upsert {
                variant_id: v.variant.id,
                quantity: 2,
                properties: props,
            }]
        );
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let cart_id = CartId::new();
        let a = catalog_variant(1000, 10, InventoryPolicy::Deny);
        let b = catalog_variant(500, 2, InventoryPolicy::Deny);
        let mut server = vec![server_line(cart_id, a.variant.id, 3)];
        let payload = [local(&a, 1), local(&b, 5)];

        let first = merge_lines(&server, &payload);
        apply(cart_id, &mut server, &first);
        let after_first = server.clone();

        let second = merge_lines(&server, &payload);
        apply(cart_id, &mut server, &second);

        assert!(second.is_noop());
        assert_eq!(server, after_first);
    }
}
