pub mod auth;
pub mod grns;
pub mod purchase_orders;
pub mod sales_challans;
pub mod sales_orders;
pub mod stock;
