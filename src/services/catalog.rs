use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{category, combo, combo_item, dish},
    errors::ServiceError,
};

/// Reference to a priced catalog item: a dish or a combo, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    Dish(Uuid),
    Combo(Uuid),
}

impl ItemRef {
    /// Builds a reference from the mutually exclusive id pair used in
    /// order line requests.
    pub fn from_ids(dish_id: Option<Uuid>, combo_id: Option<Uuid>) -> Result<Self, ServiceError> {
        match (dish_id, combo_id) {
            (Some(dish), None) => Ok(ItemRef::Dish(dish)),
            (None, Some(combo)) => Ok(ItemRef::Combo(combo)),
            (Some(_), Some(_)) => Err(ServiceError::ValidationError(
                "Line item must reference a dish or a combo, not both".to_string(),
            )),
            (None, None) => Err(ServiceError::ValidationError(
                "Line item must reference a dish or a combo".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDishRequest {
    #[validate(length(min = 1, max = 200, message = "Dish name is required"))]
    pub name: String,
    pub category_id: Option<Uuid>,
    pub price: Decimal,
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDishRequest {
    #[validate(length(min = 1, max = 200, message = "Dish name is required"))]
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub price: Option<Decimal>,
    pub active: Option<bool>,
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateComboRequest {
    #[validate(length(min = 1, max = 200, message = "Combo name is required"))]
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    /// Component dishes: (dish id, quantity)
    pub items: Vec<ComboComponent>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ComboComponent {
    pub dish_id: Uuid,
    #[validate(range(min = 1, message = "Component quantity must be at least 1"))]
    pub quantity: i32,
}

/// Read-mostly reference data: dishes, combos and categories. The one
/// authoritative pricing point for every order path.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Resolves an item reference to its current catalog price.
    ///
    /// Order lines snapshot this value at creation; client-supplied
    /// prices are never trusted for authoritative totals.
    pub async fn price_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        item: ItemRef,
    ) -> Result<Decimal, ServiceError> {
        match item {
            ItemRef::Dish(id) => {
                let dish = dish::Entity::find_by_id(id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Dish {} not found", id)))?;
                if !dish.active {
                    return Err(ServiceError::ValidationError(format!(
                        "Dish '{}' is not available",
                        dish.name
                    )));
                }
                Ok(dish.price)
            }
            ItemRef::Combo(id) => {
                let combo = combo::Entity::find_by_id(id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Combo {} not found", id)))?;
                if !combo.active {
                    return Err(ServiceError::ValidationError(format!(
                        "Combo '{}' is not available",
                        combo.name
                    )));
                }
                Ok(combo.price)
            }
        }
    }

    /// Display name of an item, with a fallback when the relation is
    /// missing (e.g. a dish deleted after the order was taken).
    pub async fn item_name<C: ConnectionTrait>(&self, conn: &C, item: ItemRef) -> String {
        let name = match item {
            ItemRef::Dish(id) => dish::Entity::find_by_id(id)
                .one(conn)
                .await
                .ok()
                .flatten()
                .map(|d| d.name),
            ItemRef::Combo(id) => combo::Entity::find_by_id(id)
                .one(conn)
                .await
                .ok()
                .flatten()
                .map(|c| c.name),
        };
        name.unwrap_or_else(|| {
            warn!(?item, "catalog item missing, using fallback name");
            "Unknown item".to_string()
        })
    }

    #[instrument(skip(self, request))]
    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        request.validate()?;
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_dish(&self, request: CreateDishRequest) -> Result<dish::Model, ServiceError> {
        request.validate()?;
        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Dish price must not be negative".to_string(),
            ));
        }
        if let Some(category_id) = request.category_id {
            category::Entity::find_by_id(category_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Category {} not found", category_id))
                })?;
        }

        let model = dish::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            category_id: Set(request.category_id),
            price: Set(request.price),
            active: Set(true),
            description: Set(request.description),
            image_ref: Set(request.image_ref),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        Ok(model.insert(&*self.db).await?)
    }

    #[instrument(skip(self, request), fields(dish_id = %dish_id))]
    pub async fn update_dish(
        &self,
        dish_id: Uuid,
        request: UpdateDishRequest,
    ) -> Result<dish::Model, ServiceError> {
        request.validate()?;
        let dish = dish::Entity::find_by_id(dish_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Dish {} not found", dish_id)))?;

        let mut active: dish::ActiveModel = dish.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(price) = request.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Dish price must not be negative".to_string(),
                ));
            }
            active.price = Set(price);
        }
        if request.category_id.is_some() {
            active.category_id = Set(request.category_id);
        }
        if let Some(flag) = request.active {
            active.active = Set(flag);
        }
        if request.description.is_some() {
            active.description = Set(request.description);
        }
        if request.image_ref.is_some() {
            active.image_ref = Set(request.image_ref);
        }
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(&*self.db).await?)
    }

    pub async fn get_dish(&self, dish_id: Uuid) -> Result<dish::Model, ServiceError> {
        dish::Entity::find_by_id(dish_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Dish {} not found", dish_id)))
    }

    pub async fn list_dishes(
        &self,
        category_id: Option<Uuid>,
    ) -> Result<Vec<dish::Model>, ServiceError> {
        let mut query = dish::Entity::find().order_by_asc(dish::Column::Name);
        if let Some(category_id) = category_id {
            query = query.filter(dish::Column::CategoryId.eq(category_id));
        }
        Ok(query.all(&*self.db).await?)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_combo(
        &self,
        request: CreateComboRequest,
    ) -> Result<combo::Model, ServiceError> {
        request.validate()?;
        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Combo price must not be negative".to_string(),
            ));
        }

        for component in &request.items {
            dish::Entity::find_by_id(component.dish_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Dish {} not found", component.dish_id))
                })?;
        }

        let combo_id = Uuid::new_v4();
        let model = combo::ActiveModel {
            id: Set(combo_id),
            name: Set(request.name),
            price: Set(request.price),
            active: Set(true),
            description: Set(request.description),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        let combo = model.insert(&*self.db).await?;

        for component in request.items {
            combo_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                combo_id: Set(combo_id),
                dish_id: Set(component.dish_id),
                quantity: Set(component.quantity),
            }
            .insert(&*self.db)
            .await?;
        }

        Ok(combo)
    }

    pub async fn get_combo(&self, combo_id: Uuid) -> Result<combo::Model, ServiceError> {
        combo::Entity::find_by_id(combo_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Combo {} not found", combo_id)))
    }

    pub async fn list_combos(&self) -> Result<Vec<combo::Model>, ServiceError> {
        Ok(combo::Entity::find()
            .order_by_asc(combo::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn combo_items(&self, combo_id: Uuid) -> Result<Vec<combo_item::Model>, ServiceError> {
        Ok(combo_item::Entity::find()
            .filter(combo_item::Column::ComboId.eq(combo_id))
            .all(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ref_requires_exactly_one_id() {
        let dish = Uuid::new_v4();
        let combo = Uuid::new_v4();

        assert_eq!(
            ItemRef::from_ids(Some(dish), None).unwrap(),
            ItemRef::Dish(dish)
        );
        assert_eq!(
            ItemRef::from_ids(None, Some(combo)).unwrap(),
            ItemRef::Combo(combo)
        );
        assert!(ItemRef::from_ids(Some(dish), Some(combo)).is_err());
        assert!(ItemRef::from_ids(None, None).is_err());
    }
}
