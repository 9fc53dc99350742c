use common::{LocationId, UserId, VariantId};
use domain::{MovementType, OrderStatus};

/// Filter for order listings.
///
/// Orders are returned newest first. Logically removed orders are excluded
/// unless `include_inactive` is set.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by owning user.
    pub user_id: Option<UserId>,

    /// Filter by status.
    pub status: Option<OrderStatus>,

    /// Include orders whose `is_active` flag is cleared.
    pub include_inactive: bool,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a single user's orders.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Filter for inventory level listings.
#[derive(Debug, Clone, Default)]
pub struct LevelQuery {
    pub variant_id: Option<VariantId>,
    pub location_id: Option<LocationId>,
    /// Only levels whose `available` is at or below this value.
    pub max_available: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl LevelQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variant(mut self, variant_id: VariantId) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn low_stock(mut self, threshold: i64) -> Self {
        self.max_available = Some(threshold);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Filter for movement history. Movements are returned newest first.
#[derive(Debug, Clone, Default)]
pub struct MovementQuery {
    pub variant_id: Option<VariantId>,
    pub location_id: Option<LocationId>,
    pub movement_type: Option<MovementType>,
    pub reference_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl MovementQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variant(mut self, variant_id: VariantId) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn movement_type(mut self, movement_type: MovementType) -> Self {
        self.movement_type = Some(movement_type);
        self
    }

    pub fn reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Applies offset then limit to an already ordered list.
pub(crate) fn paginate<T>(items: Vec<T>, offset: Option<usize>, limit: Option<usize>) -> Vec<T> {
    let items = items.into_iter().skip(offset.unwrap_or(0));
    match limit {
        Some(limit) => items.take(limit).collect(),
        None => items.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_query_for_user() {
        let user = UserId::new();
        let query = OrderQuery::for_user(user).limit(20).offset(40);

        assert_eq!(query.user_id, Some(user));
        assert!(!query.include_inactive);
        assert_eq!(query.limit, Some(20));
        assert_eq!(query.offset, Some(40));
    }

    #[test]
    fn movement_query_builder_chain() {
        let variant = VariantId::new();
        let location = LocationId::new();
        let query = MovementQuery::new()
            .variant(variant)
            .location(location)
            .movement_type(MovementType::Sale)
            .reference("202412250001");

        assert_eq!(query.variant_id, Some(variant));
        assert_eq!(query.location_id, Some(location));
        assert_eq!(query.movement_type, Some(MovementType::Sale));
        assert_eq!(query.reference_id.as_deref(), Some("202412250001"));
    }

    #[test]
    fn paginate_skips_then_takes() {
        let items: Vec<u32> = (1..=10).collect();
        assert_eq!(paginate(items.clone(), Some(2), Some(3)), vec![3, 4, 5]);
        assert_eq!(paginate(items.clone(), None, Some(2)), vec![1, 2]);
        assert_eq!(paginate(items, Some(9), None), vec![10]);
    }
}
