//! Seeds a database with demo catalog and affiliate data.
//!
//! Usage: `cargo run -p vitrin-db --bin seed [path/to/vitrin.db]`

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use vitrin_core::{Affiliate, Variant};
use vitrin_db::{Database, DbConfig, DbResult};

#[tokio::main]
async fn main() -> DbResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "vitrin.db".to_string());

    info!(path = %path, "Seeding database");
    let db = Database::new(DbConfig::new(&path)).await?;

    seed_catalog(&db).await?;
    seed_affiliates(&db).await?;

    info!("Seed complete");
    db.close().await;
    Ok(())
}

async fn seed_catalog(db: &Database) -> DbResult<()> {
    let inv = db.inventory();
    let now = Utc::now();

    let products = [
        ("T-Shirt", vec![("TS-BLUE-XL", "Blue / XL", 50_000, 25), ("TS-RED-M", "Red / M", 50_000, 40)]),
        ("Hoodie", vec![("HD-BLACK-L", "Black / L", 120_000, 12)]),
        ("Cap", vec![("CP-GREEN", "Green", 30_000, 60)]),
    ];

    for (name, variants) in products {
        let product_id = Uuid::new_v4().to_string();
        inv.insert_product(&product_id, name).await?;
        info!(product = name, "Created product");

        for (sku, variant_name, price_cents, stock) in variants {
            inv.insert_variant(&Variant {
                id: Uuid::new_v4().to_string(),
                product_id: product_id.clone(),
                sku: sku.to_string(),
                name: variant_name.to_string(),
                price_cents,
                stock_on_hand: stock,
                stock_reserved: 0,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
        }
    }

    Ok(())
}

async fn seed_affiliates(db: &Database) -> DbResult<()> {
    let affiliates = db.affiliates();
    let now = Utc::now();

    let parent_id = Uuid::new_v4().to_string();
    affiliates
        .insert(&Affiliate {
            id: parent_id.clone(),
            display_name: "Root Affiliate".to_string(),
            parent_affiliate_id: None,
            bank_iban: Some("IR820540102680020817909002".to_string()),
            bank_holder: Some("Root Affiliate".to_string()),
            is_active: true,
            created_at: now,
        })
        .await?;

    affiliates
        .insert(&Affiliate {
            id: Uuid::new_v4().to_string(),
            display_name: "Child Affiliate".to_string(),
            parent_affiliate_id: Some(parent_id),
            bank_iban: Some("IR062960000000100324200001".to_string()),
            bank_holder: Some("Child Affiliate".to_string()),
            is_active: true,
            created_at: now,
        })
        .await?;

    info!("Created affiliates");
    Ok(())
}
