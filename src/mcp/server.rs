//! Nutriledger MCP Server Implementation
//!
//! Exposes the ledger service as MCP tools over stdio.

use std::collections::BTreeMap;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::SqliteCatalog;
use crate::error::LedgerError;
use crate::service::LedgerService;
use crate::tools::status::StatusTracker;
use crate::tools::{catalog, containers};

/// Nutriledger MCP Service
#[derive(Clone)]
pub struct LedgerMcpService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    ledger: LedgerService,
    local_catalog: SqliteCatalog,
    tool_router: ToolRouter<LedgerMcpService>,
}

impl LedgerMcpService {
    pub fn new(status_tracker: StatusTracker, ledger: LedgerService, local_catalog: SqliteCatalog) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(status_tracker)),
            ledger,
            local_catalog,
            tool_router: Self::tool_router(),
        }
    }
}

/// Validation and lookup failures are the caller's to fix; the rest are ours
fn to_mcp_error(err: LedgerError) -> McpError {
    if err.is_validation() || err.is_not_found() {
        McpError::invalid_params(err.to_string(), None)
    } else {
        McpError::internal_error(err.to_string(), None)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// ============================================================================
// Container Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateContainerParams {
    /// Daily record the container belongs to
    pub record_id: i64,
    /// Display name; generated ("Default 1", ...) when omitted
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RecordParams {
    pub record_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ContainerParams {
    pub container_id: i64,
    /// When given, the container must belong to this record
    pub record_id: Option<i64>,
}

// ============================================================================
// Entry Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddFoodParams {
    pub container_id: i64,
    /// Catalog name of the food
    pub food: String,
    /// Amount to add, in the food's base unit (grams or milliliters)
    #[schemars(with = "f64")]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ChangeFoodAmountParams {
    pub container_id: i64,
    pub food: String,
    /// New total amount of the entry
    #[schemars(with = "f64")]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FoodEntryParams {
    pub container_id: i64,
    pub food: String,
}

// ============================================================================
// Catalog Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpsertCatalogFoodParams {
    pub name: String,
    /// Reference size; defaults to 100
    #[schemars(with = "Option<f64>")]
    pub size: Option<Decimal>,
    /// Calories per reference size
    #[schemars(with = "f64")]
    pub calories: Decimal,
    /// Nutrient amounts per reference size, keyed like "protein", "vitaminC", "transFat"
    #[serde(default)]
    #[schemars(with = "BTreeMap<String, f64>")]
    pub nutrients: BTreeMap<String, Decimal>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CatalogFoodParams {
    pub name: String,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl LedgerMcpService {
    // --- Status ---

    #[tool(description = "Get the current status of the nutriledger service including build info, database status, catalog source, and process information")]
    async fn ledger_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        to_json(&tracker.get_status())
    }

    // --- Containers ---

    #[tool(description = "Create a meal container for a daily record. A name is generated when none is given.")]
    async fn create_container(&self, Parameters(p): Parameters<CreateContainerParams>) -> Result<CallToolResult, McpError> {
        let result = containers::create_container(&self.ledger, p.record_id, p.name)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    #[tool(description = "Create the four default containers (First Meal, Second Meal, Third Meal, Snacks) for a daily record")]
    async fn create_default_containers(&self, Parameters(p): Parameters<RecordParams>) -> Result<CallToolResult, McpError> {
        let result = containers::create_default_containers(&self.ledger, p.record_id)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    #[tool(description = "List the containers of a daily record with their consumed calories")]
    async fn list_containers(&self, Parameters(p): Parameters<RecordParams>) -> Result<CallToolResult, McpError> {
        let result = containers::list_containers(&self.ledger, p.record_id)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    #[tool(description = "Get a container with every food entry, consumed calories, and nutrient totals")]
    async fn get_container(&self, Parameters(p): Parameters<ContainerParams>) -> Result<CallToolResult, McpError> {
        let result = containers::get_container(&self.ledger, p.container_id, p.record_id)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    #[tool(description = "Delete a container and all of its entries")]
    async fn delete_container(&self, Parameters(p): Parameters<ContainerParams>) -> Result<CallToolResult, McpError> {
        let result = containers::delete_container(&self.ledger, p.container_id, p.record_id)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    #[tool(description = "Delete every container of a daily record, for use when the record itself is deleted")]
    async fn delete_record_containers(&self, Parameters(p): Parameters<RecordParams>) -> Result<CallToolResult, McpError> {
        let result = containers::delete_record_containers(&self.ledger, p.record_id)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    // --- Entries ---

    #[tool(description = "Add an amount of a catalog food to a container. Adding a food that is already present merges into its entry.")]
    async fn add_food(&self, Parameters(p): Parameters<AddFoodParams>) -> Result<CallToolResult, McpError> {
        let result = containers::add_food(&self.ledger, p.container_id, &p.food, p.amount)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    #[tool(description = "Set the total amount of a food already in a container, rescaling calories and nutrients")]
    async fn change_food_amount(&self, Parameters(p): Parameters<ChangeFoodAmountParams>) -> Result<CallToolResult, McpError> {
        let result = containers::change_food_amount(&self.ledger, p.container_id, &p.food, p.amount)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    #[tool(description = "Remove a food entry from a container")]
    async fn remove_food(&self, Parameters(p): Parameters<FoodEntryParams>) -> Result<CallToolResult, McpError> {
        let result = containers::remove_food(&self.ledger, p.container_id, &p.food)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    #[tool(description = "Get one food entry of a container")]
    async fn get_food_entry(&self, Parameters(p): Parameters<FoodEntryParams>) -> Result<CallToolResult, McpError> {
        let result = containers::get_food_entry(&self.ledger, p.container_id, &p.food)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    // --- Catalog ---

    #[tool(description = "Create or replace a food in the local catalog. Values are per 100 units (grams or milliliters).")]
    async fn upsert_catalog_food(&self, Parameters(p): Parameters<UpsertCatalogFoodParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::upsert_catalog_food(&self.local_catalog, &p.name, p.size, p.calories, &p.nutrients)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }

    #[tool(description = "Look up a food's reference composition in the active catalog")]
    async fn get_catalog_food(&self, Parameters(p): Parameters<CatalogFoodParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::get_catalog_food(&self.ledger, &p.name)
            .await
            .map_err(to_mcp_error)?;
        to_json(&result)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for LedgerMcpService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "nutriledger".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Nutriledger".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Nutriledger - per-meal calorie and nutrient aggregation. \
                 Containers (meals) belong to a daily record: create_container, create_default_containers, \
                 list_containers, get_container, delete_container (pass record_id to require ownership), \
                 delete_record_containers. \
                 Entries: add_food (amount in grams/ml; repeated adds merge), change_food_amount (sets the new total), \
                 remove_food, get_food_entry. \
                 Catalog foods are defined per 100 units: upsert_catalog_food, get_catalog_food. \
                 Amounts are exact decimals. Status: ledger_status."
                    .into(),
            ),
        }
    }
}
