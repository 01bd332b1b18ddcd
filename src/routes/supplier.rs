use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        products::{
            AddImageRequest, CreateProductRequest, ProductCreated, SetStockRequest,
            SupplierProductList, UpdateProductRequest,
        },
        reviews::AnswerQuestionRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Product, ProductImage, ProductQuestion},
    response::ApiResponse,
    services::{product_service, review_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add-product", post(add_product))
        .route("/product/{id}/update", put(update_product))
        .route("/product/{id}/stock", put(set_stock))
        .route("/product/{id}/images", post(add_image))
        .route("/my-products", get(my_products))
        .route("/questions/{id}/answer", put(answer_question))
}

#[utoipa::path(
    post,
    path = "/api/supplier/add-product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product listed", body = ApiResponse<ProductCreated>),
        (status = 400, description = "Invalid product data"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Supplier role required"),
    ),
    security(("session_cookie" = []), ("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn add_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductCreated>>)> {
    let resp = product_service::add_product(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/supplier/product/{id}/update",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Supplied fields replaced", body = ApiResponse<Product>),
        (status = 400, description = "Invalid product data"),
        (status = 403, description = "Not the owning supplier"),
        (status = 404, description = "Product not found"),
    ),
    security(("session_cookie" = []), ("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/supplier/product/{id}/stock",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = SetStockRequest,
    responses(
        (status = 200, description = "Stock level set", body = ApiResponse<Product>),
        (status = 400, description = "Negative stock"),
        (status = 403, description = "Not the owning supplier"),
        (status = 404, description = "Product not found"),
    ),
    security(("session_cookie" = []), ("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn set_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStockRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::set_stock(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/supplier/product/{id}/images",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = AddImageRequest,
    responses(
        (status = 201, description = "Image attached", body = ApiResponse<ProductImage>),
        (status = 400, description = "Empty image URL"),
        (status = 403, description = "Not the owning supplier"),
        (status = 404, description = "Product not found"),
    ),
    security(("session_cookie" = []), ("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn add_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddImageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductImage>>)> {
    let resp = product_service::add_image(&state, &user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/supplier/my-products",
    responses(
        (status = 200, description = "Products owned by the caller", body = ApiResponse<SupplierProductList>),
        (status = 403, description = "Supplier role required"),
    ),
    security(("session_cookie" = []), ("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn my_products(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SupplierProductList>>> {
    let resp = product_service::my_products(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/supplier/questions/{id}/answer",
    params(
        ("id" = Uuid, Path, description = "Question ID")
    ),
    request_body = AnswerQuestionRequest,
    responses(
        (status = 200, description = "Answer saved", body = ApiResponse<ProductQuestion>),
        (status = 403, description = "Not the owning supplier"),
        (status = 404, description = "Question not found"),
    ),
    security(("session_cookie" = []), ("bearer_auth" = [])),
    tag = "Supplier"
)]
pub async fn answer_question(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerQuestionRequest>,
) -> AppResult<Json<ApiResponse<ProductQuestion>>> {
    let resp = review_service::answer_question(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
