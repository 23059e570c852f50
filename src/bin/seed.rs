use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use partsmarket_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin123", "admin").await?;
    let vendor_id = ensure_user(&pool, "vendor@example.com", "vendor123", "vendor").await?;
    let customer_id = ensure_user(&pool, "customer@example.com", "customer123", "customer").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin: {admin_id}, Vendor: {vendor_id}, Customer: {customer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(row.0)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let models = vec![
        ("Apple", "iPhone 13"),
        ("Apple", "iPhone 14"),
        ("Samsung", "Galaxy S22"),
        ("Samsung", "Galaxy A54"),
        ("Google", "Pixel 8"),
    ];

    for (brand, name) in models {
        sqlx::query(
            r#"
            INSERT INTO phone_models (id, brand, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (brand, name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(brand)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let components = vec![
        "Display assembly",
        "Battery",
        "Rear camera",
        "Charging port",
        "Back glass",
        "Speaker",
    ];

    for name in components {
        sqlx::query(
            r#"
            INSERT INTO components (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
