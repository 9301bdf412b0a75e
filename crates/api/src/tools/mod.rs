//! Shopping tools for the chat service.
//!
//! The chat service's agent is given these definitions and calls them back
//! through `POST /tools/{name}`. Each tool maps onto the catalog or cart
//! service, so the agent manipulates the cart under exactly the same rules
//! as the UI does.

mod executor;

pub use executor::{ToolError, ToolExecutor};

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Default page size for `list_products`.
pub const DEFAULT_LIST_LIMIT: i64 = 10;

/// A tool the agent may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool.
    pub name: String,
    /// Description of what the tool does.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: serde_json::Value,
}

/// Get all tools.
#[must_use]
pub fn all_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_products".to_string(),
            description: "Browse the product catalog. Returns id, name, price, description, \
                category and emoji for each product. Filter by category or a search term."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "Only products in this category (case-insensitive)"
                    },
                    "search_query": {
                        "type": "string",
                        "description": "Text to look for in name, description or category"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Number of products to return (1-50, default 10)",
                        "minimum": 1,
                        "maximum": 50
                    }
                }
            }),
        },
        ToolDefinition {
            name: "add_to_cart".to_string(),
            description: "Add a product to the shopping cart. Adding a product that is \
                already in the cart increases its quantity. Returns the updated cart."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "product_id": {
                        "type": "integer",
                        "description": "The product ID from list_products"
                    },
                    "quantity": {
                        "type": "integer",
                        "description": "Number of units to add (default 1)",
                        "minimum": 1
                    }
                },
                "required": ["product_id"]
            }),
        },
        ToolDefinition {
            name: "view_cart".to_string(),
            description: "Show the shopping cart: every line with its quantity and subtotal, \
                the total price and the number of items."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: "remove_from_cart".to_string(),
            description: "Remove a product from the shopping cart entirely. Succeeds even if \
                the product was not in the cart."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "product_id": {
                        "type": "integer",
                        "description": "The product ID to remove"
                    }
                },
                "required": ["product_id"]
            }),
        },
    ]
}

/// Get a tool by name.
#[must_use]
pub fn get_tool_by_name(name: &str) -> Option<ToolDefinition> {
    all_tools().into_iter().find(|t| t.name == name)
}
