use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use shop_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    dto::{
        auth::{LoginRequest, SignupRequest},
        cart::{AddToCartRequest, UpdateCartItemRequest},
        orders::UpdateOrderStatusRequest,
        products::{
            CreateCategoryRequest, CreateProductRequest, SetStockRequest, UpdateProductRequest,
        },
        reviews::{AnswerQuestionRequest, CreateQuestionRequest, CreateReviewRequest},
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::Entity as Products,
        sea_orm_active_enums::{OrderStatus, Role},
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::MAX_LINE_QUANTITY,
    routes::params::{OrderListQuery, ProductQuery, ProductSortBy, SortOrder},
    services::{
        admin_service, auth_service, cart_service, order_service, product_service, review_service,
    },
    state::AppState,
};
use uuid::Uuid;

// These tests need Postgres. Each one works on its own users and products,
// so they can share a database and run in parallel.
async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run shop flow tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 5).await?;
    run_migrations(&pool).await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "flow-test-secret".into(),
        session_ttl_hours: 1,
        cookie_secure: false,
        db_max_connections: 5,
    };
    Ok(Some(AppState::new(pool, config)))
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// Create an account with any role and return it as an authenticated caller.
async fn account(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let email = unique_email(role.as_str());
    let password = "password123";
    let user = match role {
        Role::Customer | Role::Supplier => auth_service::signup(
            state,
            SignupRequest {
                name: format!("Test {}", role.as_str()),
                email: email.clone(),
                password: password.into(),
                role: Some(role.as_str().into()),
            },
        )
        .await?
        .data
        .expect("user"),
        Role::Staff | Role::Admin => {
            let root = bootstrap_admin(state).await?;
            auth_service::create_user(
                state,
                &root,
                SignupRequest {
                    name: format!("Test {}", role.as_str()),
                    email: email.clone(),
                    password: password.into(),
                    role: Some(role.as_str().into()),
                },
            )
            .await?
            .data
            .expect("user")
        }
    };
    login(state, &user.email, password).await
}

// Admin accounts can only be made by an admin, so the first one is written directly.
async fn bootstrap_admin(state: &AppState) -> anyhow::Result<AuthUser> {
    let email = unique_email("root");
    let password_hash = auth_service::hash_password("password123")?;
    let (user_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, 'admin') RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind("Root")
    .bind(&email)
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await?;
    let auth = login(state, &email, "password123").await?;
    assert_eq!(auth.user_id, user_id);
    Ok(auth)
}

async fn login(state: &AppState, email: &str, password: &str) -> anyhow::Result<AuthUser> {
    let resp = auth_service::login(
        state,
        LoginRequest {
            email: email.into(),
            password: password.into(),
        },
    )
    .await?;
    let token = resp.data.expect("token").token;
    Ok(auth_service::resolve_session(state, &token).await?)
}

async fn category(state: &AppState) -> anyhow::Result<Uuid> {
    let admin = bootstrap_admin(state).await?;
    let created = product_service::create_category(
        state,
        &admin,
        CreateCategoryRequest {
            name: format!("Category {}", Uuid::new_v4().simple()),
        },
    )
    .await?;
    Ok(created.data.expect("category").id)
}

async fn product(
    state: &AppState,
    supplier: &AuthUser,
    category_id: Uuid,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let created = product_service::add_product(
        state,
        supplier,
        CreateProductRequest {
            title: format!("Widget {price}"),
            description: "A product for testing".into(),
            price,
            stock,
            category_id,
            discount: None,
            thumbnail: None,
        },
    )
    .await?;
    Ok(created.data.expect("product").product_id)
}

async fn add(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> Result<shop_api::models::CartItem, AppError> {
    let resp = cart_service::add_item(state, user, AddToCartRequest { product_id, quantity }).await?;
    Ok(resp.data.expect("cart item"))
}

#[tokio::test]
async fn adding_the_same_product_merges_quantities() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let customer = account(&state, Role::Customer).await?;
    let product_id = product(&state, &supplier, category(&state).await?, 10, 20).await?;

    add(&state, &customer, product_id, 2).await?;
    let merged = add(&state, &customer, product_id, 3).await?;
    assert_eq!(merged.quantity, 5);

    let cart = cart_service::get_cart(&state, &customer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.total, 50);
    Ok(())
}

#[tokio::test]
async fn get_or_create_cart_is_idempotent() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let customer = account(&state, Role::Customer).await?;

    let first = cart_service::get_or_create_cart(&state, customer.user_id).await?;
    let second = cart_service::get_or_create_cart(&state, customer.user_id).await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn adding_an_unknown_product_is_not_found() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let customer = account(&state, Role::Customer).await?;

    let err = add(&state, &customer, Uuid::new_v4(), 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let err = add(&state, &customer, Uuid::new_v4(), 0).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn checkout_snapshots_prices_and_empties_the_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let customer = account(&state, Role::Customer).await?;
    let category_id = category(&state).await?;
    let p10 = product(&state, &supplier, category_id, 10, 5).await?;
    let p5 = product(&state, &supplier, category_id, 5, 5).await?;

    add(&state, &customer, p10, 2).await?;
    add(&state, &customer, p5, 1).await?;

    let receipt = order_service::checkout(&state, &customer)
        .await?
        .data
        .expect("receipt");
    assert_eq!(receipt.total, 25);
    assert_eq!(receipt.items.len(), 2);

    // Later price changes do not touch the order.
    product_service::update_product(
        &state,
        &supplier,
        p10,
        UpdateProductRequest {
            price: Some(999),
            ..Default::default()
        },
    )
    .await?;
    let order = order_service::get_order(&state, &customer, receipt.order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(order.order.total_amount, 25);
    assert_eq!(order.order.status, OrderStatus::Pending);
    let line = order.items.iter().find(|i| i.product_id == p10).expect("line");
    assert_eq!(line.price, 10);
    assert_eq!(line.line_total, 20);

    let cart = cart_service::get_cart(&state, &customer).await?.data.expect("cart");
    assert!(cart.items.is_empty());

    let stock = Products::find_by_id(p10).one(&state.orm).await?.expect("product").stock;
    assert_eq!(stock, 3);

    let (audited,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_logs WHERE user_id = $1 AND action = 'checkout'",
    )
    .bind(customer.user_id)
    .fetch_one(&state.pool)
    .await?;
    assert_eq!(audited, 1);
    Ok(())
}

#[tokio::test]
async fn empty_cart_checkout_creates_no_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let customer = account(&state, Role::Customer).await?;
    cart_service::get_or_create_cart(&state, customer.user_id).await?;

    let err = order_service::checkout(&state, &customer).await.unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(customer.user_id))
        .count(&state.orm)
        .await?;
    assert_eq!(orders, 0);
    Ok(())
}

#[tokio::test]
async fn insufficient_stock_fails_checkout_and_keeps_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let customer = account(&state, Role::Customer).await?;
    let product_id = product(&state, &supplier, category(&state).await?, 10, 1).await?;

    add(&state, &customer, product_id, 2).await?;
    let err = order_service::checkout(&state, &customer).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let cart = cart_service::get_cart(&state, &customer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn updating_another_users_cart_line_is_forbidden() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let owner = account(&state, Role::Customer).await?;
    let intruder = account(&state, Role::Customer).await?;
    let product_id = product(&state, &supplier, category(&state).await?, 10, 20).await?;

    let item = add(&state, &owner, product_id, 2).await?;
    let err = cart_service::update_item(
        &state,
        &intruder,
        UpdateCartItemRequest {
            item_id: item.id,
            quantity: 9,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = cart_service::remove_item(&state, &intruder, item.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let cart = cart_service::get_cart(&state, &owner).await?.data.expect("cart");
    assert_eq!(cart.items[0].quantity, 2);

    let updated = cart_service::update_item(
        &state,
        &owner,
        UpdateCartItemRequest {
            item_id: item.id,
            quantity: 7,
        },
    )
    .await?
    .data
    .expect("item");
    assert_eq!(updated.quantity, 7);
    Ok(())
}

#[tokio::test]
async fn duplicate_signup_is_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let email = unique_email("dup");
    let request = |email: &str| SignupRequest {
        name: "Dup".into(),
        email: email.into(),
        password: "password123".into(),
        role: None,
    };

    let user = auth_service::signup(&state, request(&email)).await?.data.expect("user");
    assert_eq!(user.role, Role::Customer);

    let err = auth_service::signup(&state, request(&email.to_uppercase()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEmail));
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let customer = account(&state, Role::Customer).await?;
    let email = auth_service::current_user(&state, Some(&customer))
        .await?
        .data
        .and_then(|c| c.user)
        .expect("user")
        .email;

    let err = auth_service::login(
        &state,
        LoginRequest {
            email,
            password: "not-the-password".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
    Ok(())
}

#[tokio::test]
async fn logout_invalidates_the_session() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let email = unique_email("logout");
    auth_service::signup(
        &state,
        SignupRequest {
            name: "Leaving".into(),
            email: email.clone(),
            password: "password123".into(),
            role: None,
        },
    )
    .await?;
    let token = auth_service::login(
        &state,
        LoginRequest {
            email,
            password: "password123".into(),
        },
    )
    .await?
    .data
    .expect("token")
    .token;

    let user = auth_service::resolve_session(&state, &token).await?;
    auth_service::logout(&state, &user).await?;

    let err = auth_service::resolve_session(&state, &token).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated));
    Ok(())
}

#[tokio::test]
async fn supplier_product_round_trip_and_partial_update() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let other_supplier = account(&state, Role::Supplier).await?;
    let customer = account(&state, Role::Customer).await?;
    let category_id = category(&state).await?;

    let product_id = product_service::add_product(
        &state,
        &supplier,
        CreateProductRequest {
            title: "Enamel Mug".into(),
            description: "Holds 350 ml of coffee".into(),
            price: 1_000,
            stock: 4,
            category_id,
            discount: Some(10),
            thumbnail: Some("/img/mug.png".into()),
        },
    )
    .await?
    .data
    .expect("created")
    .product_id;

    let detail = product_service::get_product(&state, product_id)
        .await?
        .data
        .expect("detail");
    let stored = &detail.product;
    assert_eq!(stored.title, "Enamel Mug");
    assert_eq!(stored.description, "Holds 350 ml of coffee");
    assert_eq!(stored.price, 1_000);
    assert_eq!(stored.stock, 4);
    assert_eq!(stored.category_id, category_id);
    assert_eq!(stored.discount, 10);
    assert_eq!(stored.discounted_price, 900);
    assert_eq!(stored.thumbnail.as_deref(), Some("/img/mug.png"));
    assert_eq!(stored.supplier_id, supplier.user_id);
    assert_eq!(detail.review_count, 0);
    assert!(detail.images.is_empty());

    let updated = product_service::update_product(
        &state,
        &supplier,
        product_id,
        UpdateProductRequest {
            discount: Some(20),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("product");
    assert_eq!(updated.title, stored.title);
    assert_eq!(updated.description, stored.description);
    assert_eq!(updated.price, 1_000);
    assert_eq!(updated.stock, 4);
    assert_eq!(updated.category_id, category_id);
    assert_eq!(updated.thumbnail, stored.thumbnail);
    assert_eq!(updated.discounted_price, 800);

    let err = product_service::update_product(
        &state,
        &other_supplier,
        product_id,
        UpdateProductRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = product_service::add_product(
        &state,
        &customer,
        CreateProductRequest {
            title: "Nope".into(),
            description: "Customers cannot list products".into(),
            price: 1,
            stock: 1,
            category_id,
            discount: None,
            thumbnail: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}

#[tokio::test]
async fn my_products_lists_every_owned_product() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let other_supplier = account(&state, Role::Supplier).await?;
    let category_id = category(&state).await?;
    let first = product(&state, &supplier, category_id, 100, 1).await?;
    let second = product(&state, &supplier, category_id, 200, 1).await?;
    let foreign = product(&state, &other_supplier, category_id, 300, 1).await?;

    let mine = product_service::my_products(&state, &supplier)
        .await?
        .data
        .expect("products");
    let mut ids: Vec<Uuid> = mine.items.iter().map(|p| p.id).collect();
    ids.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(!ids.contains(&foreign));
    Ok(())
}

#[tokio::test]
async fn oversized_product_input_is_a_validation_error() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let category_id = category(&state).await?;
    let request = |title: String, price: i64| CreateProductRequest {
        title,
        description: "Too much".into(),
        price,
        stock: 1,
        category_id,
        discount: Some(50),
        thumbnail: None,
    };

    let too_dear = request("Gold bar".into(), 200_000_000_000_000_000);
    let err = product_service::add_product(&state, &supplier, too_dear)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = product_service::add_product(&state, &supplier, request("t".repeat(201), 100))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = auth_service::signup(
        &state,
        SignupRequest {
            name: "n".repeat(101),
            email: unique_email("long"),
            password: "password123".into(),
            role: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn set_stock_rejects_negative_and_foreign_products() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let other_supplier = account(&state, Role::Supplier).await?;
    let product_id = product(&state, &supplier, category(&state).await?, 100, 3).await?;

    let err =
        product_service::set_stock(&state, &supplier, product_id, SetStockRequest { stock: -1 })
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = product_service::set_stock(
        &state,
        &other_supplier,
        product_id,
        SetStockRequest { stock: 50 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let stored = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(stored.stock, 3);

    let updated =
        product_service::set_stock(&state, &supplier, product_id, SetStockRequest { stock: 0 })
            .await?
            .data
            .expect("product");
    assert_eq!(updated.stock, 0);
    Ok(())
}

#[tokio::test]
async fn list_products_filters_and_sorts() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let category_id = category(&state).await?;
    let cheap = product(&state, &supplier, category_id, 100, 5).await?;
    let mid = product(&state, &supplier, category_id, 500, 0).await?;
    let dear = product(&state, &supplier, category_id, 900, 2).await?;

    let list = |query: ProductQuery| product_service::list_products(&state, query);

    let all = list(ProductQuery {
        supplier_id: Some(supplier.user_id),
        sort_by: Some(ProductSortBy::Price),
        sort_order: Some(SortOrder::Asc),
        ..Default::default()
    })
    .await?;
    assert_eq!(all.meta.as_ref().and_then(|m| m.total), Some(3));
    let ids: Vec<Uuid> = all.data.expect("list").items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![cheap, mid, dear]);

    let in_range = list(ProductQuery {
        supplier_id: Some(supplier.user_id),
        min_price: Some(200),
        in_stock: Some(true),
        ..Default::default()
    })
    .await?
    .data
    .expect("list");
    let ids: Vec<Uuid> = in_range.items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![dear]);

    let searched = list(ProductQuery {
        supplier_id: Some(supplier.user_id),
        q: Some("widget 5".into()),
        category_id: Some(category_id),
        ..Default::default()
    })
    .await?
    .data
    .expect("list");
    let ids: Vec<Uuid> = searched.items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![mid]);

    let paged = list(ProductQuery {
        supplier_id: Some(supplier.user_id),
        page: Some(i64::MAX),
        ..Default::default()
    })
    .await?
    .data
    .expect("list");
    assert!(paged.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn clear_cart_is_idempotent() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let customer = account(&state, Role::Customer).await?;
    let product_id = product(&state, &supplier, category(&state).await?, 10, 5).await?;

    let empty = cart_service::clear_cart(&state, &customer).await?.data.expect("result");
    assert_eq!(empty["removed"], 0);

    add(&state, &customer, product_id, 2).await?;
    let cleared = cart_service::clear_cart(&state, &customer).await?.data.expect("result");
    assert_eq!(cleared["removed"], 1);
    let again = cart_service::clear_cart(&state, &customer).await?.data.expect("result");
    assert_eq!(again["removed"], 0);

    let cart = cart_service::get_cart(&state, &customer).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, 0);
    Ok(())
}

#[tokio::test]
async fn merged_quantity_is_capped() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let customer = account(&state, Role::Customer).await?;
    let product_id = product(&state, &supplier, category(&state).await?, 10, 5).await?;

    add(&state, &customer, product_id, MAX_LINE_QUANTITY - 1).await?;
    let err = add(&state, &customer, product_id, 2).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = add(&state, &customer, product_id, i32::MAX).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let cart = cart_service::get_cart(&state, &customer).await?.data.expect("cart");
    assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY - 1);

    let topped = add(&state, &customer, product_id, 1).await?;
    assert_eq!(topped.quantity, MAX_LINE_QUANTITY);
    Ok(())
}

#[tokio::test]
async fn only_the_owning_supplier_answers_questions() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let other_supplier = account(&state, Role::Supplier).await?;
    let customer = account(&state, Role::Customer).await?;
    let product_id = product(&state, &supplier, category(&state).await?, 100, 1).await?;

    let err = review_service::add_question(
        &state,
        &customer,
        product_id,
        CreateQuestionRequest {
            question: "   ".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let question = review_service::add_question(
        &state,
        &customer,
        product_id,
        CreateQuestionRequest {
            question: "Is it dishwasher safe?".into(),
        },
    )
    .await?
    .data
    .expect("question");
    assert!(question.answer.is_none());

    let answer = |text: &str| AnswerQuestionRequest {
        answer: text.into(),
    };

    let err = review_service::answer_question(&state, &other_supplier, question.id, answer("No"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = review_service::answer_question(&state, &customer, question.id, answer("No"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = review_service::answer_question(&state, &supplier, Uuid::new_v4(), answer("No"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let answered = review_service::answer_question(&state, &supplier, question.id, answer("Yes"))
        .await?
        .data
        .expect("question");
    assert_eq!(answered.answer.as_deref(), Some("Yes"));
    assert!(answered.answered_at.is_some());

    let listed = review_service::list_questions(&state, product_id)
        .await?
        .data
        .expect("questions");
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].answer.as_deref(), Some("Yes"));
    Ok(())
}

#[tokio::test]
async fn login_sweeps_expired_sessions() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let email = unique_email("sweep");
    let user = auth_service::signup(
        &state,
        SignupRequest {
            name: "Sweep".into(),
            email: email.clone(),
            password: "password123".into(),
            role: None,
        },
    )
    .await?
    .data
    .expect("user");

    sqlx::query(
        "INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, now() - interval '1 hour')",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .execute(&state.pool)
    .await?;

    login(&state, &email, "password123").await?;

    let (expired, live): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FILTER (WHERE expires_at <= now()),
               COUNT(*) FILTER (WHERE expires_at > now())
        FROM sessions WHERE user_id = $1
        "#,
    )
    .bind(user.id)
    .fetch_one(&state.pool)
    .await?;
    assert_eq!(expired, 0);
    assert_eq!(live, 1);
    Ok(())
}

#[tokio::test]
async fn reviews_are_one_per_customer() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let customer = account(&state, Role::Customer).await?;
    let product_id = product(&state, &supplier, category(&state).await?, 100, 1).await?;
    let review = |rating| CreateReviewRequest {
        rating,
        comment: Some("Solid".into()),
    };

    review_service::add_review(&state, &customer, product_id, review(4)).await?;
    let err = review_service::add_review(&state, &customer, product_id, review(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = review_service::add_review(&state, &supplier, product_id, review(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let detail = product_service::get_product(&state, product_id)
        .await?
        .data
        .expect("detail");
    assert_eq!(detail.review_count, 1);
    assert_eq!(detail.average_rating, Some(4.0));
    Ok(())
}

#[tokio::test]
async fn staff_move_orders_and_cancel_restores_stock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let supplier = account(&state, Role::Supplier).await?;
    let customer = account(&state, Role::Customer).await?;
    let staff = account(&state, Role::Staff).await?;
    let product_id = product(&state, &supplier, category(&state).await?, 10, 5).await?;

    add(&state, &customer, product_id, 3).await?;
    let order_id = order_service::checkout(&state, &customer)
        .await?
        .data
        .expect("receipt")
        .order_id;

    let err = admin_service::list_all_orders(&state, &customer, OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let paid = admin_service::update_order_status(
        &state,
        &staff,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Paid,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(paid.status, OrderStatus::Paid);

    admin_service::update_order_status(
        &state,
        &staff,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
        },
    )
    .await?;
    let stock = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product")
        .stock;
    assert_eq!(stock, 5);

    let err = admin_service::update_order_status(
        &state,
        &staff,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Paid,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = order_service::get_order(&state, &staff, order_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}
