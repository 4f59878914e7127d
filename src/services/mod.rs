pub mod allocation_service;
pub mod audit_service;
pub mod auth_service;
pub mod document_number_service;
pub mod grn_service;
pub mod ledger_service;
pub mod lot_service;
pub mod purchase_order_service;
pub mod sales_challan_service;
pub mod sales_order_service;
pub mod stock_service;
pub mod transaction_service;
