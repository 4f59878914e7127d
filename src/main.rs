use axum::{
    extract::Extension,
    http::{header, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod services;
mod utils;

#[tokio::main]
async fn main() {
    // Load configuration first (needed for log_level)
    let config = config::Config::from_env().expect("Failed to load configuration");

    // Initialize tracing with log_level from config
    let log_filter = format!(
        "yarn_inventory_backend={},tower_http=info",
        config.log_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Create database connection pool with configuration
    let db_pool = db::create_pool(
        &config.database_connection_string(),
        config.database_max_connections,
        config.database_min_connections,
        config.database_connection_timeout_secs,
    )
    .await
    .expect("Failed to create database connection pool");

    tracing::info!("Database connection pool created successfully");

    // Configure CORS with allowed origins from config
    // Note: Cannot use Any (wildcard) for headers when credentials are enabled
    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_allowed_origins
                .iter()
                .map(|origin| origin.parse().expect("Invalid CORS origin"))
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    // Create middleware layer to inject Config into request extensions
    let config_clone = config.clone();
    let add_config = axum_middleware::from_fn(
        move |mut req: axum::http::Request<axum::body::Body>, next: axum::middleware::Next| {
            let config = config_clone.clone();
            async move {
                req.extensions_mut().insert(config);
                next.run(req).await
            }
        },
    );

    // Build authentication routes (NO JWT required for login)
    let auth_routes = Router::new()
        .route("/login", post(api::auth::login_endpoint))
        .route("/me", get(api::auth::get_current_user_endpoint))
        .with_state(db_pool.clone());

    // Build protected API routes (require JWT authentication)
    let protected_routes = Router::new()
        // Goods receipts (inbound)
        .route("/grns", get(api::grns::list_grns_endpoint))
        .route("/grns", post(api::grns::create_grn_endpoint))
        .route("/grns/:grnId", delete(api::grns::delete_grn_endpoint))
        .route("/grns/:grnId/items", get(api::grns::get_grn_items_endpoint))
        // Sales orders (reserve / unreserve / convert)
        .route(
            "/sales-orders",
            get(api::sales_orders::list_sales_orders_endpoint),
        )
        .route(
            "/sales-orders",
            post(api::sales_orders::create_sales_order_endpoint),
        )
        .route(
            "/sales-orders/:soId",
            delete(api::sales_orders::delete_sales_order_endpoint),
        )
        .route(
            "/sales-orders/:soId/items",
            get(api::sales_orders::get_sales_order_items_endpoint),
        )
        .route(
            "/sales-orders/:soId/status",
            put(api::sales_orders::update_sales_order_status_endpoint),
        )
        .route(
            "/sales-orders/:soId/convert",
            post(api::sales_orders::convert_sales_order_endpoint),
        )
        // Sales challans (outbound)
        .route(
            "/sales-challans",
            get(api::sales_challans::list_challans_endpoint),
        )
        .route(
            "/sales-challans",
            post(api::sales_challans::create_challan_endpoint),
        )
        .route(
            "/sales-challans/:scId",
            delete(api::sales_challans::delete_challan_endpoint),
        )
        .route(
            "/sales-challans/:scId/items",
            get(api::sales_challans::get_challan_items_endpoint),
        )
        .route(
            "/sales-challans/:scId/status",
            put(api::sales_challans::update_challan_status_endpoint),
        )
        // Purchase orders (lifecycle guard only, never touches stock)
        .route(
            "/purchase-orders",
            get(api::purchase_orders::list_purchase_orders_endpoint),
        )
        .route(
            "/purchase-orders/:poId",
            put(api::purchase_orders::update_purchase_order_endpoint),
        )
        // Stock views and audit trail
        .route("/stock", get(api::stock::list_stock_endpoint))
        .route(
            "/stock/by-category",
            get(api::stock::list_stock_by_category_endpoint),
        )
        .route(
            "/stock/lots/:lotId/transactions",
            get(api::stock::list_lot_transactions_endpoint),
        )
        .route("/audit-logs", get(api::stock::list_audit_logs_endpoint))
        .with_state(db_pool.clone());

    // Build application routes with middleware
    let mut app = Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", protected_routes)
        .layer(add_config);

    // Conditionally add request logging based on config
    if config.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app = app.layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app).await.expect("Server error");
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    app_name: String,
    version: String,
    company: String,
}

async fn health_check(Extension(config): Extension<config::Config>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        app_name: config.app_name,
        version: config.app_version,
        company: config.company_name,
    })
}
