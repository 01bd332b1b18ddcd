use shop_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    entity::sea_orm_active_enums::Role,
    services::auth_service::hash_password,
};
use sqlx::PgPool;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "Admin", "admin@example.com", "admin123", Role::Admin).await?;
    ensure_user(&pool, "Staff", "staff@example.com", "staff123", Role::Staff).await?;
    let supplier_id =
        ensure_user(&pool, "Ferris Goods", "supplier@example.com", "supplier123", Role::Supplier)
            .await?;
    let customer_id =
        ensure_user(&pool, "Customer", "customer@example.com", "customer123", Role::Customer)
            .await?;

    let apparel = ensure_category(&pool, "Apparel").await?;
    let kitchen = ensure_category(&pool, "Kitchen").await?;
    seed_products(&pool, supplier_id, apparel, kitchen).await?;

    println!("Seed completed. Admin ID: {admin_id}, Customer ID: {customer_id}");
    Ok(())
}

/// Re-running keeps the existing account; only the role is reset.
async fn ensure_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={})", role.as_str());
    Ok(user_id)
}

async fn ensure_category(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    let (category_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(category_id)
}

async fn seed_products(
    pool: &PgPool,
    supplier_id: Uuid,
    apparel: Uuid,
    kitchen: Uuid,
) -> anyhow::Result<()> {
    let products = [
        ("Axum Hoodie", "Warm hoodie for Rustaceans", 5_500_000_i64, 0, 50, apparel),
        ("Rust Sticker Pack", "Decorate your laptop", 50_000, 10, 200, apparel),
        ("Ferris Mug", "Coffee tastes better with Ferris", 120_000, 0, 100, kitchen),
        ("Crab Tea Towel", "Dries dishes, memory safe", 80_000, 25, 40, kitchen),
    ];

    for (title, description, price, discount, stock, category_id) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, supplier_id, category_id, title, description, price, discount, stock)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8
            WHERE NOT EXISTS (
                SELECT 1 FROM products WHERE supplier_id = $2 AND title = $4
            )
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(supplier_id)
        .bind(category_id)
        .bind(title)
        .bind(description)
        .bind(price)
        .bind(discount)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
