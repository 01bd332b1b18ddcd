use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    categories::Model as CategoryModel,
    order_items::Model as OrderItemModel,
    orders::Model as OrderModel,
    product_images::Model as ProductImageModel,
    product_questions::Model as QuestionModel,
    products::Model as ProductModel,
    reviews::Model as ReviewModel,
    sea_orm_active_enums::{OrderStatus, Role},
    users::Model as UserModel,
};

/// Highest accepted product price, in minor units. Kept well below `i64::MAX`
/// so a full cart line (`MAX_PRICE * MAX_LINE_QUANTITY`) still fits.
pub const MAX_PRICE: i64 = 1_000_000_000_000;

/// Highest quantity a single cart or order line may hold.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// Price after applying a percentage discount, in the same minor units as `price`.
///
/// `discount` is clamped to `0..=100`, so the result lies in `0..=price` for a
/// non-negative price. The product is taken in `i128` and cannot overflow.
pub fn discounted_price(price: i64, discount: i32) -> i64 {
    let discount = i128::from(discount.clamp(0, 100));
    let off = i128::from(price) * discount / 100;
    // |off| <= |price|, so the narrowing is lossless.
    price - off as i64
}

/// `unit * quantity`, saturating instead of wrapping.
pub fn line_total(unit: i64, quantity: i32) -> i64 {
    unit.saturating_mul(i64::from(quantity))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<UserModel> for User {
    fn from(model: UserModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

impl From<CategoryModel> for Category {
    fn from(model: CategoryModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub discount: i32,
    pub discounted_price: i64,
    pub stock: i32,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ProductModel> for Product {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            supplier_id: model.supplier_id,
            category_id: model.category_id,
            discounted_price: discounted_price(model.price, model.discount),
            title: model.title,
            description: model.description,
            price: model.price,
            discount: model.discount,
            stock: model.stock,
            thumbnail: model.thumbnail,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub title: String,
    pub price: i64,
    pub discount: i32,
    pub discounted_price: i64,
    pub stock: i32,
    pub thumbnail: Option<String>,
    pub category_id: Uuid,
    pub category_name: Option<String>,
}

impl ProductSummary {
    pub fn new(model: ProductModel, category: Option<CategoryModel>) -> Self {
        Self {
            id: model.id,
            discounted_price: discounted_price(model.price, model.discount),
            title: model.title,
            price: model.price,
            discount: model.discount,
            stock: model.stock,
            thumbnail: model.thumbnail,
            category_id: model.category_id,
            category_name: category.map(|c| c.name),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<ProductImageModel> for ProductImage {
    fn from(model: ProductImageModel) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            image_url: model.image_url,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewModel> for Review {
    fn from(model: ReviewModel) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductQuestion {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub question: String,
    pub answer: Option<String>,
    pub answered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<QuestionModel> for ProductQuestion {
    fn from(model: QuestionModel) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            question: model.question,
            answer: model.answer,
            answered_at: model.answered_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for Order {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            total_amount: model.total_amount,
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price frozen at checkout.
    pub price: i64,
    pub line_total: i64,
    pub created_at: DateTime<Utc>,
}

impl From<OrderItemModel> for OrderItem {
    fn from(model: OrderItemModel) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            quantity: model.quantity,
            price: model.price,
            line_total: line_total(model.price, model.quantity),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_LINE_QUANTITY, MAX_PRICE, discounted_price, line_total};

    #[test]
    fn discounted_price_applies_percentage() {
        assert_eq!(discounted_price(10_000, 0), 10_000);
        assert_eq!(discounted_price(10_000, 25), 7_500);
        assert_eq!(discounted_price(10_000, 100), 0);
    }

    #[test]
    fn discounted_price_never_negative() {
        for discount in 0..=100 {
            for price in [0_i64, 1, 99, 1_999, 250_000] {
                let value = discounted_price(price, discount);
                assert!(value >= 0, "price {price} discount {discount} gave {value}");
                assert!(value <= price);
            }
        }
        assert_eq!(discounted_price(500, 150), 0);
        assert_eq!(discounted_price(500, -10), 500);
    }

    #[test]
    fn discounted_price_handles_huge_prices() {
        let price = 200_000_000_000_000_000_i64;
        assert_eq!(discounted_price(price, 50), 100_000_000_000_000_000);
        assert_eq!(discounted_price(i64::MAX, 100), 0);
        assert_eq!(discounted_price(i64::MAX, 0), i64::MAX);
        let half = discounted_price(i64::MAX, 50);
        assert!(half > 0 && half <= i64::MAX);
    }

    #[test]
    fn largest_line_fits() {
        assert_eq!(
            line_total(MAX_PRICE, MAX_LINE_QUANTITY),
            MAX_PRICE * i64::from(MAX_LINE_QUANTITY)
        );
        assert_eq!(line_total(i64::MAX, 2), i64::MAX);
    }
}
