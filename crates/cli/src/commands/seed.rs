//! Seed the catalog with demo products.
//!
//! Idempotent: products are upserted by slug, variants by (product, size).

use rust_decimal::Decimal;

use super::CommandError;

struct SeedProduct {
    name: &'static str,
    slug: &'static str,
    description: &'static str,
    category: &'static str,
    variants: &'static [(&'static str, &'static str, i32)],
}

const CATALOG: &[SeedProduct] = &[
    SeedProduct {
        name: "House Blend",
        slug: "house-blend",
        description: "Balanced everyday espresso blend with chocolate notes.",
        category: "coffee",
        variants: &[("250g", "5.00", 40), ("1kg", "18.50", 12)],
    },
    SeedProduct {
        name: "Single Origin Ethiopia",
        slug: "single-origin-ethiopia",
        description: "Washed Yirgacheffe, floral and citrus-forward.",
        category: "coffee",
        variants: &[("250g", "9.50", 25), ("1kg", "34.00", 6)],
    },
    SeedProduct {
        name: "Cold Brew Concentrate",
        slug: "cold-brew-concentrate",
        description: "Slow-steeped concentrate, dilute 1:2.",
        category: "ready-to-drink",
        variants: &[("500ml", "7.25", 18)],
    },
    SeedProduct {
        name: "Ceramic Mug",
        slug: "ceramic-mug",
        description: "Stoneware mug with the Coffee Hub roast chart.",
        category: "equipment",
        variants: &[("300ml", "12.00", 30), ("450ml", "14.00", 20)],
    },
];

/// Insert the demo catalog.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    for product in CATALOG {
        let product_id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO product (name, slug, description, category)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug)
            DO UPDATE SET name = EXCLUDED.name,
                          description = EXCLUDED.description,
                          category = EXCLUDED.category,
                          updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(product.name)
        .bind(product.slug)
        .bind(product.description)
        .bind(product.category)
        .fetch_one(&pool)
        .await?;

        for &(size, price, stock) in product.variants {
            let price: Decimal = price
                .parse()
                .map_err(|_| CommandError::Invalid(format!("bad seed price: {price}")))?;
            sqlx::query(
                r"
                INSERT INTO product_variant (product_id, size, unit_price, stock_count)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (product_id, size)
                DO UPDATE SET unit_price = EXCLUDED.unit_price,
                              stock_count = EXCLUDED.stock_count
                ",
            )
            .bind(product_id)
            .bind(size)
            .bind(price)
            .bind(stock)
            .execute(&pool)
            .await?;
        }

        tracing::info!(product = product.slug, "seeded");
    }

    tracing::info!("Seed complete: {} products", CATALOG.len());
    Ok(())
}
