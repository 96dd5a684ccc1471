//! Read-only projection of controller state for the presentation layer.

use std::collections::BTreeMap;

use shared::domain::{AttributeValue, ItemId};

use crate::{
    controller::{CatalogStatus, SelectionController},
    error::FailureKind,
    lifecycle::LifecycleState,
};

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogView {
    Loading,
    /// Loaded, but the service offered nothing to select.
    Empty,
    Ready,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub name: ItemId,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub media: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorBanner {
    pub message: String,
    pub kind: FailureKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub name: ItemId,
    pub quantity: f64,
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub rows: Vec<ResultRow>,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerView {
    pub catalog: CatalogView,
    pub items: Vec<ItemView>,
    pub submit_enabled: bool,
    pub pending: bool,
    pub error: Option<ErrorBanner>,
    pub result: Option<ResultView>,
}

impl ControllerView {
    pub fn project(controller: &SelectionController) -> Self {
        let catalog = controller.catalog();
        let selection = controller.selection();

        let catalog_view = match controller.catalog_status() {
            CatalogStatus::Loading => CatalogView::Loading,
            CatalogStatus::Unavailable(err) => CatalogView::Unavailable(err.to_string()),
            CatalogStatus::Ready if catalog.is_empty() => CatalogView::Empty,
            CatalogStatus::Ready => CatalogView::Ready,
        };

        let items = catalog
            .items()
            .iter()
            .map(|item| ItemView {
                name: item.name.clone(),
                attributes: item.attributes.clone(),
                media: item.media.clone(),
                selected: selection.contains(item.name.as_str()),
            })
            .collect();

        let state = controller.state();
        let error = state.failure().map(|failure| ErrorBanner {
            message: failure.message().to_string(),
            kind: failure.kind(),
        });

        let result = state.result().map(|result| {
            let mut rows: Vec<ResultRow> = result
                .quantities()
                .iter()
                .map(|(name, quantity)| ResultRow {
                    name: name.clone(),
                    quantity: *quantity,
                    attributes: catalog
                        .get(name.as_str())
                        .map(|item| item.attributes.clone())
                        .unwrap_or_default(),
                })
                .collect();
            rows.sort_by_key(|row| catalog.position(row.name.as_str()).unwrap_or(usize::MAX));
            ResultView {
                rows,
                total_cost: result.total_cost(),
            }
        });

        Self {
            catalog: catalog_view,
            items,
            submit_enabled: !matches!(state, LifecycleState::InFlight(_)),
            pending: state.is_pending(),
            error,
            result,
        }
    }

    pub fn selected_count(&self) -> usize {
        self.items.iter().filter(|item| item.selected).count()
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
