//! Container and Entry MCP Tools
//!
//! Tools for managing meal containers and the foods logged into them.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    ContainerSummary, Ledger, Nutrient, NutrientAmounts, NutrientCategory, NutrientComposition,
};
use crate::service::{EntryUpdate, LedgerService};

/// An amount with the unit it is measured in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityView {
    pub amount: Decimal,
    pub unit: &'static str,
}

/// A composition with zero nutrients left out
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub name: String,
    pub size: Decimal,
    pub calories: Decimal,
    pub nutrients: BTreeMap<Nutrient, QuantityView>,
}

impl From<&NutrientComposition> for EntryView {
    fn from(food: &NutrientComposition) -> Self {
        Self {
            name: food.name().to_string(),
            size: food.size(),
            calories: food.calories(),
            nutrients: non_zero(food.nutrients()),
        }
    }
}

/// Container with its entries and totals
#[derive(Debug, Serialize)]
pub struct ContainerDetail {
    pub id: i64,
    pub record_id: i64,
    pub name: String,
    pub version: u64,
    pub consumed_calories: Decimal,
    pub entries: Vec<EntryView>,
    pub nutrient_totals: BTreeMap<NutrientCategory, BTreeMap<Nutrient, QuantityView>>,
}

impl ContainerDetail {
    fn from_ledger(ledger: &Ledger) -> LedgerResult<Self> {
        Ok(Self {
            id: ledger.container_id(),
            record_id: ledger.record_id(),
            name: ledger.name().to_string(),
            version: ledger.version(),
            consumed_calories: ledger.consumed_calories(),
            entries: ledger.get_all().map(EntryView::from).collect(),
            nutrient_totals: by_category(&ledger.nutrient_totals()?),
        })
    }
}

/// Response for list_containers and create_default_containers
#[derive(Debug, Serialize)]
pub struct ContainerListResponse {
    pub record_id: i64,
    pub containers: Vec<ContainerSummary>,
    pub total_calories: Decimal,
}

impl ContainerListResponse {
    fn new(record_id: i64, ledgers: &[Ledger]) -> LedgerResult<Self> {
        let total_calories = ledgers.iter().try_fold(Decimal::ZERO, |acc, l| {
            acc.checked_add(l.consumed_calories())
                .ok_or_else(|| LedgerError::validation("total_calories", "total overflows"))
        })?;

        Ok(Self {
            record_id,
            containers: ledgers.iter().map(ContainerSummary::from).collect(),
            total_calories,
        })
    }
}

/// Response for add_food, change_food_amount and remove_food
#[derive(Debug, Serialize)]
pub struct EntryChangeResponse {
    pub success: bool,
    pub message: String,
    pub container_id: i64,
    pub entry: EntryView,
    pub consumed_calories: Decimal,
    pub version: u64,
}

impl EntryChangeResponse {
    fn new(update: &EntryUpdate, message: String) -> Self {
        Self {
            success: true,
            message,
            container_id: update.ledger.container_id(),
            entry: EntryView::from(&update.entry),
            consumed_calories: update.ledger.consumed_calories(),
            version: update.ledger.version(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteContainerResponse {
    pub success: bool,
    pub message: String,
}

/// Response for delete_record_containers
#[derive(Debug, Serialize)]
pub struct DeleteRecordContainersResponse {
    pub success: bool,
    pub record_id: i64,
    pub deleted: usize,
}

fn non_zero(amounts: &NutrientAmounts) -> BTreeMap<Nutrient, QuantityView> {
    amounts
        .iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(nutrient, amount)| (nutrient, QuantityView { amount, unit: nutrient.unit() }))
        .collect()
}

fn by_category(amounts: &NutrientAmounts) -> BTreeMap<NutrientCategory, BTreeMap<Nutrient, QuantityView>> {
    let mut grouped: BTreeMap<NutrientCategory, BTreeMap<Nutrient, QuantityView>> = BTreeMap::new();
    for (nutrient, quantity) in non_zero(amounts) {
        grouped.entry(nutrient.category()).or_default().insert(nutrient, quantity);
    }
    grouped
}

// ============================================================================
// Container Tools
// ============================================================================

pub async fn create_container(
    service: &LedgerService,
    record_id: i64,
    name: Option<String>,
) -> LedgerResult<ContainerSummary> {
    let ledger = service.create_container(record_id, name).await?;
    Ok(ContainerSummary::from(&ledger))
}

pub async fn create_default_containers(
    service: &LedgerService,
    record_id: i64,
) -> LedgerResult<ContainerListResponse> {
    let created = service.create_default_containers(record_id).await?;
    ContainerListResponse::new(record_id, &created)
}

pub async fn list_containers(
    service: &LedgerService,
    record_id: i64,
) -> LedgerResult<ContainerListResponse> {
    let ledgers = service.list_containers(record_id).await?;
    ContainerListResponse::new(record_id, &ledgers)
}

/// Get a container; with a record id, a container of another record is not found
pub async fn get_container(
    service: &LedgerService,
    container_id: i64,
    record_id: Option<i64>,
) -> LedgerResult<ContainerDetail> {
    let ledger = match record_id {
        Some(record_id) => service.get_record_container(record_id, container_id).await?,
        None => service.get_container(container_id).await?,
    };
    ContainerDetail::from_ledger(&ledger)
}

pub async fn delete_container(
    service: &LedgerService,
    container_id: i64,
    record_id: Option<i64>,
) -> LedgerResult<DeleteContainerResponse> {
    match record_id {
        Some(record_id) => service.delete_record_container(record_id, container_id).await?,
        None => service.delete_container(container_id).await?,
    }
    Ok(DeleteContainerResponse {
        success: true,
        message: format!("Container {} deleted", container_id),
    })
}

/// Delete every container of a record, as when the record itself goes away
pub async fn delete_record_containers(
    service: &LedgerService,
    record_id: i64,
) -> LedgerResult<DeleteRecordContainersResponse> {
    let deleted = service.delete_containers_for_record(record_id).await?;
    Ok(DeleteRecordContainersResponse {
        success: true,
        record_id,
        deleted,
    })
}

// ============================================================================
// Entry Tools
// ============================================================================

pub async fn add_food(
    service: &LedgerService,
    container_id: i64,
    food: &str,
    amount: Decimal,
) -> LedgerResult<EntryChangeResponse> {
    let update = service.add_or_merge(container_id, food, amount).await?;
    let message = format!(
        "Added {} of '{}'; entry now {}",
        amount,
        update.entry.name(),
        update.entry.size()
    );
    Ok(EntryChangeResponse::new(&update, message))
}

pub async fn change_food_amount(
    service: &LedgerService,
    container_id: i64,
    food: &str,
    amount: Decimal,
) -> LedgerResult<EntryChangeResponse> {
    let update = service.change_amount(container_id, food, amount).await?;
    let message = format!("Set '{}' to {}", update.entry.name(), amount);
    Ok(EntryChangeResponse::new(&update, message))
}

pub async fn remove_food(
    service: &LedgerService,
    container_id: i64,
    food: &str,
) -> LedgerResult<EntryChangeResponse> {
    let update = service.remove(container_id, food).await?;
    let message = format!("Removed '{}'", update.entry.name());
    Ok(EntryChangeResponse::new(&update, message))
}

pub async fn get_food_entry(
    service: &LedgerService,
    container_id: i64,
    food: &str,
) -> LedgerResult<EntryView> {
    let entry = service.get_entry(container_id, food).await?;
    Ok(EntryView::from(&entry))
}
