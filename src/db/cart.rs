//! Session carts.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem};
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, sqlx::FromRow)]
struct CartRow { product_id: Uuid, size: String, name: String, quantity: i32, price: Decimal }

pub async fn get(pool: &PgPool, session_id: &str) -> Result<Cart, sqlx::Error> {
    let rows = sqlx::query_as::<_, CartRow>(
        "SELECT c.product_id, c.size, p.name, c.quantity, p.price FROM cart_items c JOIN products p ON p.id = c.product_id \
         WHERE c.session_id = $1 AND p.status = 'active' ORDER BY c.created_at",
    )
    .bind(session_id).fetch_all(pool).await?;
    let mut cart = Cart::new(session_id);
    for r in rows {
        cart.add_item(CartItem {
            product_id: r.product_id, size: r.size, name: r.name,
            quantity: u32::try_from(r.quantity).unwrap_or(0), unit_price: Money::inr(r.price),
        });
    }
    Ok(cart)
}

/// Adds to an existing line for the same product and size, or creates one.
pub async fn add(pool: &PgPool, session_id: &str, product_id: Uuid, size: &str, quantity: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO cart_items (id, session_id, product_id, size, quantity, created_at) VALUES ($1, $2, $3, $4, $5, NOW()) \
         ON CONFLICT (session_id, product_id, size) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity",
    )
    .bind(Uuid::now_v7()).bind(session_id).bind(product_id).bind(size).bind(quantity).execute(pool).await?;
    Ok(())
}

pub async fn clear(pool: &PgPool, session_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(session_id).execute(pool).await?;
    Ok(())
}

/// Sets a line's quantity; zero removes the line.
pub async fn set_quantity(pool: &PgPool, session_id: &str, product_id: Uuid, size: &str, quantity: u32) -> Result<(), sqlx::Error> {
    if quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND product_id = $2 AND size = $3")
            .bind(session_id).bind(product_id).bind(size).execute(pool).await?;
    } else {
        sqlx::query("UPDATE cart_items SET quantity = $4 WHERE session_id = $1 AND product_id = $2 AND size = $3")
            .bind(session_id).bind(product_id).bind(size).bind(i32::try_from(quantity).unwrap_or(i32::MAX)).execute(pool).await?;
    }
    Ok(())
}
