use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::entity::prelude::*;
use sea_orm::{Iterable, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[sea_orm(string_value = "phone")]
    Phone,
    #[sea_orm(string_value = "laptop")]
    Laptop,
    #[sea_orm(string_value = "tablet")]
    Tablet,
    #[sea_orm(string_value = "accessory")]
    Accessory,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Phone => "phone",
            Category::Laptop => "laptop",
            Category::Tablet => "tablet",
            Category::Accessory => "accessory",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::iter().find(|category| category.as_str() == value)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    pub stock: i32,
    pub category: Category,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub discount: Decimal,
    pub image: String,
    pub is_featured: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Unit price after the percentage discount, rounded to cents.
    pub fn discounted_price(&self) -> Decimal {
        discounted_price(self.price, self.discount)
    }
}

pub fn discounted_price(price: Decimal, discount: Decimal) -> Decimal {
    let factor = Decimal::ONE - discount / Decimal::ONE_HUNDRED;
    (price * factor).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut product = self;
        let now: DateTimeWithTimeZone = Utc::now().into();
        if insert {
            product.created_at = Set(now);
        }
        product.updated_at = Set(now);
        Ok(product)
    }
}
