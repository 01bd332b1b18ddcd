use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutReceipt, OrderList, OrderWithItems},
    entity::{
        cart_items::{self, Column as CartCol, Entity as CartItems},
        carts::{Column as CartsCol, Entity as Carts},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
        sea_orm_active_enums::OrderStatus,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, discounted_price},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// A cart line joined with the product values checkout needs.
#[derive(Debug, Clone, FromQueryResult)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub price: i64,
    pub discount: i32,
    pub stock: i32,
}

impl CheckoutLine {
    pub fn unit_price(&self) -> i64 {
        discounted_price(self.price, self.discount)
    }
}

/// Validate every line against current stock and sum the order total.
pub fn price_lines(lines: &[CheckoutLine]) -> AppResult<i64> {
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }
    let mut total: i64 = 0;
    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::validation("cart has an invalid quantity"));
        }
        if line.stock < line.quantity {
            return Err(AppError::validation(format!(
                "insufficient stock for {}",
                line.title
            )));
        }
        total = line
            .unit_price()
            .checked_mul(i64::from(line.quantity))
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| AppError::validation("order total is too large"))?;
    }
    Ok(total)
}

pub(crate) async fn load_items(
    conn: &impl sea_orm::ConnectionTrait,
    order_id: Uuid,
) -> AppResult<Vec<OrderItem>> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    Ok(items)
}

/// Turn the caller's cart into a pending order.
///
/// Runs in one transaction: the cart row is locked first so concurrent
/// checkouts and cart writes for the same user queue behind it, then the
/// lines and their products are locked, stock is decremented, the order and
/// its price snapshots are written, and the cart is emptied.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CheckoutReceipt>> {
    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartsCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::EmptyCart)?;

    let lines = CartItems::find()
        .select_only()
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::Quantity, "quantity")
        .join(JoinType::InnerJoin, cart_items::Relation::Products.def())
        .column_as(ProdCol::Title, "title")
        .column_as(ProdCol::Price, "price")
        .column_as(ProdCol::Discount, "discount")
        .column_as(ProdCol::Stock, "stock")
        .filter(CartCol::CartId.eq(cart.id))
        .order_by_asc(CartCol::CreatedAt)
        .lock(LockType::Update)
        .into_model::<CheckoutLine>()
        .all(&txn)
        .await?;

    let total_amount = price_lines(&lines)?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.unit_price()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(OrderItem::from(item));

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .filter(ProdCol::Id.eq(line.product_id))
            .exec(&txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(CartCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        total = total_amount,
        lines = items.len(),
        "checkout completed"
    );
    audit::record(
        state,
        user.user_id,
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutReceipt {
            order_id: order.id,
            total: order.total_amount,
            items,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) async fn paginate_orders(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    paginate_orders(
        state,
        Condition::all().add(OrderCol::UserId.eq(user.user_id)),
        query,
    )
    .await
}

/// Another customer's order reads as missing, not forbidden.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order: OrderModel = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = load_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i32, stock: i32) -> CheckoutLine {
        CheckoutLine {
            product_id: Uuid::new_v4(),
            title: "item".into(),
            quantity,
            price,
            discount: 0,
            stock,
        }
    }

    #[test]
    fn totals_price_times_quantity() {
        let lines = vec![line(10, 2, 5), line(5, 1, 5)];
        assert_eq!(price_lines(&lines).unwrap(), 25);
    }

    #[test]
    fn discount_reduces_unit_price() {
        let mut discounted = line(1_000, 2, 10);
        discounted.discount = 50;
        assert_eq!(discounted.unit_price(), 500);
        assert_eq!(price_lines(&[discounted]).unwrap(), 1_000);
    }

    #[test]
    fn empty_cart_is_rejected() {
        assert!(matches!(price_lines(&[]), Err(AppError::EmptyCart)));
    }

    #[test]
    fn insufficient_stock_fails_whole_checkout() {
        let lines = vec![line(10, 1, 5), line(5, 3, 2)];
        let err = price_lines(&lines).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("insufficient stock")));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let lines = vec![line(i64::MAX, 2, 10)];
        assert!(price_lines(&lines).is_err());
    }
}
