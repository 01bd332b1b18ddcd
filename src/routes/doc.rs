use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{CurrentUser, LoginRequest, LoginResponse, SignupRequest},
        cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
        orders::{CheckoutReceipt, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::{
            AddImageRequest, CategoryList, CreateCategoryRequest, CreateProductRequest,
            ProductCreated, ProductDetail, ProductList, SetStockRequest, SupplierProductList,
            UpdateProductRequest,
        },
        reviews::{
            AnswerQuestionRequest, CreateQuestionRequest, CreateReviewRequest, QuestionList,
            ReviewList,
        },
    },
    entity::sea_orm_active_enums::{OrderStatus, Role},
    middleware::auth::SESSION_COOKIE,
    models::{
        CartItem, Category, Order, OrderItem, Product, ProductImage, ProductQuestion,
        ProductSummary, Review, User,
    },
    response::{ApiResponse, Meta},
    routes::{admin, auth, customer, health, params, products, supplier},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session_cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
        );
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::signup,
        auth::login,
        auth::logout,
        auth::me,
        products::list_products,
        products::get_product,
        products::list_reviews,
        products::add_review,
        products::list_questions,
        products::add_question,
        products::list_categories,
        customer::get_cart,
        customer::add_to_cart,
        customer::update_cart_item,
        customer::remove_from_cart,
        customer::clear_cart,
        customer::checkout,
        customer::list_orders,
        customer::get_order,
        supplier::add_product,
        supplier::update_product,
        supplier::set_stock,
        supplier::add_image,
        supplier::my_products,
        supplier::answer_question,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::create_category,
        admin::create_user
    ),
    components(
        schemas(
            Role,
            OrderStatus,
            User,
            Category,
            Product,
            ProductSummary,
            ProductImage,
            Review,
            ProductQuestion,
            CartItem,
            Order,
            OrderItem,
            SignupRequest,
            LoginRequest,
            LoginResponse,
            CurrentUser,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartLine,
            CartView,
            CheckoutReceipt,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            CreateProductRequest,
            UpdateProductRequest,
            SetStockRequest,
            AddImageRequest,
            CreateCategoryRequest,
            ProductCreated,
            ProductList,
            SupplierProductList,
            CategoryList,
            ProductDetail,
            CreateReviewRequest,
            CreateQuestionRequest,
            AnswerQuestionRequest,
            ReviewList,
            QuestionList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<User>,
            ApiResponse<ProductList>,
            ApiResponse<ProductDetail>,
            ApiResponse<CartView>,
            ApiResponse<CheckoutReceipt>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Signup, login and sessions"),
        (name = "Products", description = "Public catalog"),
        (name = "Reviews", description = "Product reviews and questions"),
        (name = "Cart", description = "Shopping cart"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Supplier", description = "Supplier catalog management"),
        (name = "Admin", description = "Staff and admin back office"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
