use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
    entity::{
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems, Model as CartItemModel},
        carts::Entity as Carts,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, MAX_LINE_QUANTITY, discounted_price, line_total},
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(FromRow)]
struct CartLineRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
    title: String,
    price: i64,
    discount: i32,
    thumbnail: Option<String>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        let unit = discounted_price(row.price, row.discount);
        Self {
            id: row.id,
            product_id: row.product_id,
            title: row.title,
            price: row.price,
            discounted_price: unit,
            thumbnail: row.thumbnail,
            quantity: row.quantity,
            line_total: line_total(unit, row.quantity),
        }
    }
}

fn validate_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::validation("quantity must be at least 1"));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::validation(format!(
            "quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// Return the user's cart id, creating the cart on first use.
///
/// The unique index on `carts.user_id` makes concurrent first calls agree on
/// a single row.
pub async fn get_or_create_cart(state: &AppState, user_id: Uuid) -> AppResult<Uuid> {
    let (cart_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO carts (id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(cart_id)
}

/// Load a cart line and check it sits in a cart owned by `user`.
async fn owned_item(state: &AppState, user: &AuthUser, item_id: Uuid) -> AppResult<CartItemModel> {
    let (item, cart) = CartItems::find_by_id(item_id)
        .find_also_related(Carts)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    match cart {
        Some(cart) if cart.user_id == user.user_id => Ok(item),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::NotFound),
    }
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart_id = get_or_create_cart(state, user.user_id).await?;
    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.id, ci.product_id, ci.quantity,
               p.title, p.price, p.discount, p.thumbnail
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at, ci.id
        "#,
    )
    .bind(cart_id)
    .fetch_all(&state.pool)
    .await?;

    let items: Vec<CartLine> = rows.into_iter().map(CartLine::from).collect();
    let total = items
        .iter()
        .fold(0_i64, |acc, line| acc.saturating_add(line.line_total));
    let count = items.len() as i64;

    Ok(ApiResponse::success(
        "OK",
        CartView {
            cart_id,
            items,
            total,
        },
        Some(Meta::new(1, count, count)),
    ))
}

/// Add `quantity` of a product; an existing line for the product grows instead
/// of being duplicated.
pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    validate_quantity(payload.quantity)?;

    let product_exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::NotFound);
    }

    let cart_id = get_or_create_cart(state, user.user_id).await?;
    // The guarded merge returns no row when the summed quantity would pass the cap.
    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cart_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        WHERE cart_items.quantity::BIGINT + EXCLUDED.quantity <= $5
        RETURNING id, cart_id, product_id, quantity, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .bind(i64::from(MAX_LINE_QUANTITY))
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| {
        AppError::validation(format!(
            "a cart line may hold at most {MAX_LINE_QUANTITY} units"
        ))
    })?;

    audit::record(
        state,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", cart_item, Some(Meta::empty())))
}

/// Set a line's quantity to an absolute value.
pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    validate_quantity(payload.quantity)?;
    let item = owned_item(state, user, payload.item_id).await?;

    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    let item = match active.update(&state.orm).await {
        Ok(item) => item,
        // Removed by a concurrent request (e.g. checkout) after the ownership check.
        Err(DbErr::RecordNotUpdated) => return Err(AppError::NotFound),
        Err(err) => return Err(err.into()),
    };

    audit::record(
        state,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "item_id": item.id, "quantity": item.quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart updated",
        cart_item_from_entity(item),
        Some(Meta::empty()),
    ))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let item = owned_item(state, user, item_id).await?;
    CartItems::delete_by_id(item.id).exec(&state.orm).await?;

    audit::record(
        state,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "item_id": item.id, "product_id": item.product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Empty the user's cart; a no-op on an empty cart.
pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let cart_id = get_or_create_cart(state, user.user_id).await?;
    let result = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected > 0 {
        audit::record(
            state,
            user.user_id,
            "cart_clear",
            "cart_items",
            serde_json::json!({ "cart_id": cart_id, "removed": result.rows_affected }),
        )
        .await;
    }

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({ "removed": result.rows_affected }),
        Some(Meta::empty()),
    ))
}

fn cart_item_from_entity(model: CartItemModel) -> CartItem {
    CartItem {
        id: model.id,
        cart_id: model.cart_id,
        product_id: model.product_id,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&chrono::Utc),
    }
}
