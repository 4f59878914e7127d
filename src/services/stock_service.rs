use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::lot::{CategoryStockSummary, ProductStockSummary, StockLevelRow};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tiberius::Query;

/// Lot-level stock, optionally filtered by location and/or product.
/// Drained lots (both counters zero) are hidden; ordering is FIFO so the
/// listing reads in consumption order.
pub async fn get_stock_levels(
    pool: &DbPool,
    location_id: Option<i32>,
    product_id: Option<i32>,
) -> AppResult<Vec<StockLevelRow>> {
    let mut conn = pool.get().await?;

    let mut sql = String::from(
        r#"
        SELECT il.id, il.lot_number, il.product_id, p.product_name,
               il.category_id, c.name AS category_name,
               il.location_id, l.name AS location_name,
               il.supplier_id, s.name AS supplier_name,
               il.available_quantity, il.committed_quantity, il.created_at
        FROM inventory_lots il
        LEFT JOIN products p ON p.id = il.product_id
        LEFT JOIN categories c ON c.id = il.category_id
        LEFT JOIN locations l ON l.id = il.location_id
        LEFT JOIN suppliers s ON s.id = il.supplier_id
        WHERE (il.available_quantity > 0 OR il.committed_quantity > 0)
    "#,
    );

    if location_id.is_some() {
        sql.push_str(" AND il.location_id = @P1");
    }
    if product_id.is_some() {
        if location_id.is_some() {
            sql.push_str(" AND il.product_id = @P2");
        } else {
            sql.push_str(" AND il.product_id = @P1");
        }
    }
    sql.push_str(" ORDER BY il.created_at ASC, il.id ASC");

    let mut query = Query::new(sql);
    if let Some(location_id) = location_id {
        query.bind(location_id);
    }
    if let Some(product_id) = product_id {
        query.bind(product_id);
    }

    let rows = query.query(&mut *conn).await?.into_first_result().await?;

    let stock = rows
        .iter()
        .map(|row| StockLevelRow {
            id: row.get::<i32, _>(0).unwrap_or(0),
            lot_number: row.get::<&str, _>(1).unwrap_or("").to_string(),
            product_id: row.get::<i32, _>(2).unwrap_or(0),
            product_name: row.get::<&str, _>(3).map(|s| s.to_string()),
            category_id: row.get::<i32, _>(4).unwrap_or(0),
            category_name: row.get::<&str, _>(5).map(|s| s.to_string()),
            location_id: row.get::<i32, _>(6).unwrap_or(0),
            location_name: row.get::<&str, _>(7).map(|s| s.to_string()),
            supplier_id: row.get::<i32, _>(8).unwrap_or(0),
            supplier_name: row.get::<&str, _>(9).map(|s| s.to_string()),
            available_quantity: row
                .try_get::<Decimal, _>(10)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO),
            committed_quantity: row
                .try_get::<Decimal, _>(11)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO),
            created_at: row.try_get::<NaiveDateTime, _>(12).ok().flatten(),
        })
        .collect();

    Ok(stock)
}

/// Stock aggregated per category, with a per-product breakdown inside each
/// category. Optionally restricted to one location.
pub async fn get_stock_levels_by_category(
    pool: &DbPool,
    location_id: Option<i32>,
) -> AppResult<Vec<CategoryStockSummary>> {
    let mut conn = pool.get().await?;

    let mut category_sql = String::from(
        r#"
        SELECT c.id AS category_id, c.name AS category_name,
               SUM(il.available_quantity) AS total_available,
               SUM(il.committed_quantity) AS total_committed,
               COUNT(DISTINCT il.product_id) AS product_count
        FROM inventory_lots il
        JOIN categories c ON c.id = il.category_id
        WHERE (il.available_quantity > 0 OR il.committed_quantity > 0)
    "#,
    );
    if location_id.is_some() {
        category_sql.push_str(" AND il.location_id = @P1");
    }
    category_sql.push_str(" GROUP BY c.id, c.name ORDER BY c.name ASC");

    let mut category_query = Query::new(category_sql);
    if let Some(location_id) = location_id {
        category_query.bind(location_id);
    }

    let category_rows = category_query
        .query(&mut *conn)
        .await?
        .into_first_result()
        .await?;

    struct CategoryRow {
        category_id: i32,
        category_name: Option<String>,
        total_available: Decimal,
        total_committed: Decimal,
        product_count: i32,
    }

    let categories: Vec<CategoryRow> = category_rows
        .iter()
        .map(|row| CategoryRow {
            category_id: row.get::<i32, _>(0).unwrap_or(0),
            category_name: row.get::<&str, _>(1).map(|s| s.to_string()),
            total_available: row
                .try_get::<Decimal, _>(2)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO),
            total_committed: row
                .try_get::<Decimal, _>(3)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO),
            product_count: row.get::<i32, _>(4).unwrap_or(0),
        })
        .collect();

    let mut summaries = Vec::with_capacity(categories.len());

    for category in categories {
        let mut product_sql = String::from(
            r#"
            SELECT p.id AS product_id, p.product_name,
                   SUM(il.available_quantity) AS available_quantity,
                   SUM(il.committed_quantity) AS committed_quantity,
                   COUNT(il.id) AS lot_count
            FROM inventory_lots il
            JOIN products p ON p.id = il.product_id
            WHERE il.category_id = @P1
              AND (il.available_quantity > 0 OR il.committed_quantity > 0)
        "#,
        );
        if location_id.is_some() {
            product_sql.push_str(" AND il.location_id = @P2");
        }
        product_sql.push_str(" GROUP BY p.id, p.product_name ORDER BY p.product_name ASC");

        let mut product_query = Query::new(product_sql);
        product_query.bind(category.category_id);
        if let Some(location_id) = location_id {
            product_query.bind(location_id);
        }

        let product_rows = product_query
            .query(&mut *conn)
            .await?
            .into_first_result()
            .await?;

        let products: Vec<ProductStockSummary> = product_rows
            .iter()
            .map(|row| {
                let available = row
                    .try_get::<Decimal, _>(2)
                    .ok()
                    .flatten()
                    .unwrap_or(Decimal::ZERO);
                let committed = row
                    .try_get::<Decimal, _>(3)
                    .ok()
                    .flatten()
                    .unwrap_or(Decimal::ZERO);

                ProductStockSummary {
                    product_id: row.get::<i32, _>(0).unwrap_or(0),
                    product_name: row.get::<&str, _>(1).map(|s| s.to_string()),
                    available_quantity: available,
                    committed_quantity: committed,
                    total_quantity: available + committed,
                    lot_count: row.get::<i32, _>(4).unwrap_or(0),
                }
            })
            .collect();

        summaries.push(CategoryStockSummary {
            category_id: category.category_id,
            category_name: category.category_name,
            total_available: category.total_available,
            total_committed: category.total_committed,
            total_quantity: category.total_available + category.total_committed,
            product_count: category.product_count,
            products,
        });
    }

    Ok(summaries)
}
