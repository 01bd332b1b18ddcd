use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{
        AddImageRequest, CategoryList, CreateCategoryRequest, CreateProductRequest,
        ProductCreated, ProductDetail, ProductList, SetStockRequest, SupplierProductList,
        UpdateProductRequest,
    },
    entity::{
        categories::{ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories},
        product_images::{ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_staff, ensure_supplier},
    models::{Category, MAX_PRICE, Product, ProductImage, ProductSummary},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

// Column widths from the catalog migration.
const MAX_TITLE_LEN: usize = 200;
const MAX_URL_LEN: usize = 255;
const MAX_CATEGORY_LEN: usize = 120;

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::validation("price must not be negative"));
    }
    if price > MAX_PRICE {
        return Err(AppError::validation(format!(
            "price must be at most {MAX_PRICE}"
        )));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::validation("stock must not be negative"));
    }
    Ok(())
}

fn validate_discount(discount: i32) -> AppResult<()> {
    if !(0..=100).contains(&discount) {
        return Err(AppError::validation("discount must be between 0 and 100"));
    }
    Ok(())
}

fn max_len(value: &str, field: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn required_text(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn bounded_text(value: &str, field: &str, max: usize) -> AppResult<String> {
    let value = required_text(value, field)?;
    max_len(&value, field, max)?;
    Ok(value)
}

/// Blank clears the thumbnail.
fn clean_thumbnail(value: Option<String>) -> AppResult<Option<String>> {
    match value.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(url) => {
            max_len(url, "thumbnail", MAX_URL_LEN)?;
            Ok(Some(url.to_string()))
        }
        None => Ok(None),
    }
}

async fn ensure_category_exists(state: &AppState, category_id: Uuid) -> AppResult<()> {
    let exists = Categories::find_by_id(category_id)
        .one(&state.orm)
        .await?
        .is_some();
    if !exists {
        return Err(AppError::validation("unknown category"));
    }
    Ok(())
}

/// Load a product and check that `user` is its supplier.
async fn owned_product(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ProductModel> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if product.supplier_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(product)
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Products, Column::Title)).ilike(pattern.clone()))
                .add(Expr::col((Products, Column::Description)).ilike(pattern)),
        );
    }
    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }
    if let Some(supplier_id) = query.supplier_id {
        condition = condition.add(Column::SupplierId.eq(supplier_id));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }
    if query.in_stock == Some(true) {
        condition = condition.add(Column::Stock.gt(0));
    }

    let total = Products::find()
        .filter(condition.clone())
        .count(&state.orm)
        .await? as i64;

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Title => Column::Title,
    };
    let finder = Products::find().filter(condition);
    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let items = finder
        .order_by_asc(Column::Id)
        .find_also_related(Categories)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(product, category)| ProductSummary::new(product, category))
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let supplier_name = Users::find_by_id(product.supplier_id)
        .one(&state.orm)
        .await?
        .map(|u| u.name)
        .unwrap_or_default();
    let category_name = Categories::find_by_id(product.category_id)
        .one(&state.orm)
        .await?
        .map(|c| c.name)
        .unwrap_or_default();

    let images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product.id))
        .order_by_asc(ImageCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductImage::from)
        .collect();

    let (review_count, average_rating): (i64, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*)::BIGINT, AVG(rating)::FLOAT8 FROM reviews WHERE product_id = $1",
    )
    .bind(product.id)
    .fetch_one(&state.pool)
    .await?;

    let detail = ProductDetail {
        product: Product::from(product),
        supplier_name,
        category_name,
        images,
        review_count,
        average_rating,
    };
    Ok(ApiResponse::success("Product", detail, Some(Meta::empty())))
}

pub async fn add_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductCreated>> {
    ensure_supplier(user)?;
    let title = bounded_text(&payload.title, "title", MAX_TITLE_LEN)?;
    let description = required_text(&payload.description, "description")?;
    let thumbnail = clean_thumbnail(payload.thumbnail)?;
    validate_price(payload.price)?;
    validate_stock(payload.stock)?;
    let discount = payload.discount.unwrap_or(0);
    validate_discount(discount)?;
    ensure_category_exists(state, payload.category_id).await?;

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        supplier_id: Set(user.user_id),
        category_id: Set(payload.category_id),
        title: Set(title),
        description: Set(description),
        price: Set(payload.price),
        discount: Set(discount),
        stock: Set(payload.stock),
        thumbnail: Set(thumbnail),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        state,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        ProductCreated {
            product_id: product.id,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_supplier(user)?;
    let existing = owned_product(state, user, id).await?;

    let mut active: ActiveModel = existing.clone().into();
    if let Some(title) = payload.title {
        active.title = Set(bounded_text(&title, "title", MAX_TITLE_LEN)?);
    }
    if let Some(description) = payload.description {
        active.description = Set(required_text(&description, "description")?);
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        validate_stock(stock)?;
        active.stock = Set(stock);
    }
    if let Some(discount) = payload.discount {
        validate_discount(discount)?;
        active.discount = Set(discount);
    }
    if let Some(category_id) = payload.category_id {
        ensure_category_exists(state, category_id).await?;
        active.category_id = Set(category_id);
    }
    if payload.thumbnail.is_some() {
        active.thumbnail = Set(clean_thumbnail(payload.thumbnail)?);
    }

    if !active.is_changed() {
        return Ok(ApiResponse::success(
            "Updated",
            Product::from(existing),
            Some(Meta::empty()),
        ));
    }

    let product = active.update(&state.orm).await?;

    audit::record(
        state,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn set_stock(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: SetStockRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_supplier(user)?;
    validate_stock(payload.stock)?;
    let existing = owned_product(state, user, id).await?;

    let mut active: ActiveModel = existing.into();
    active.stock = Set(payload.stock);
    let product = active.update(&state.orm).await?;

    audit::record(
        state,
        user.user_id,
        "product_stock",
        "products",
        serde_json::json!({ "product_id": product.id, "stock": product.stock }),
    )
    .await;

    Ok(ApiResponse::success(
        "Stock updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn add_image(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AddImageRequest,
) -> AppResult<ApiResponse<ProductImage>> {
    ensure_supplier(user)?;
    let image_url = bounded_text(&payload.image_url, "image_url", MAX_URL_LEN)?;
    let product = owned_product(state, user, id).await?;

    let image = ImageActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        image_url: Set(image_url),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Image added",
        ProductImage::from(image),
        Some(Meta::empty()),
    ))
}

pub async fn my_products(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SupplierProductList>> {
    ensure_supplier(user)?;
    let items: Vec<Product> = Products::find()
        .filter(Column::SupplierId.eq(user.user_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "My products",
        SupplierProductList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_staff(user)?;
    let name = bounded_text(&payload.name, "name", MAX_CATEGORY_LEN)?;

    let inserted = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
    }
    .insert(&state.orm)
    .await;

    let category = match inserted {
        Ok(category) => category,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict("category already exists".into()));
        }
        Err(err) => return Err(err.into()),
    };

    audit::record(
        state,
        user.user_id,
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category created",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_price_and_stock() {
        assert!(validate_price(0).is_ok());
        assert!(validate_price(MAX_PRICE).is_ok());
        assert!(matches!(
            validate_price(200_000_000_000_000_000),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(validate_price(-1), Err(AppError::Validation(_))));
        assert!(validate_stock(0).is_ok());
        assert!(matches!(validate_stock(-5), Err(AppError::Validation(_))));
    }

    #[test]
    fn discount_must_be_a_percentage() {
        assert!(validate_discount(0).is_ok());
        assert!(validate_discount(100).is_ok());
        assert!(validate_discount(101).is_err());
        assert!(validate_discount(-1).is_err());
    }

    #[test]
    fn required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("  Mug ", "title").unwrap(), "Mug");
        let err = required_text("   ", "title").unwrap_err();
        assert_eq!(err.to_string(), "title is required");
    }

    #[test]
    fn text_wider_than_its_column_is_a_validation_error() {
        let title = "t".repeat(MAX_TITLE_LEN);
        assert_eq!(bounded_text(&title, "title", MAX_TITLE_LEN).unwrap(), title);
        let err = bounded_text(&"t".repeat(MAX_TITLE_LEN + 1), "title", MAX_TITLE_LEN)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Multi-byte characters count once, like Postgres VARCHAR.
        assert!(bounded_text(&"é".repeat(MAX_TITLE_LEN), "title", MAX_TITLE_LEN).is_ok());
    }

    #[test]
    fn thumbnail_is_trimmed_bounded_and_blank_clears() {
        assert_eq!(clean_thumbnail(None).unwrap(), None);
        assert_eq!(clean_thumbnail(Some("   ".into())).unwrap(), None);
        assert_eq!(
            clean_thumbnail(Some(" /img/a.png ".into())).unwrap().as_deref(),
            Some("/img/a.png")
        );
        let long = format!("/img/{}", "a".repeat(MAX_URL_LEN));
        assert!(matches!(clean_thumbnail(Some(long)), Err(AppError::Validation(_))));
    }
}
