//! Collection (category) route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;

use loomwear_core::catalog::{Category, ProductFilter, ProductSort};
use loomwear_core::{ColorId, SizeId};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::models::CurrentCustomer;
use crate::routes::products::{ProductCardView, path_handle};
use crate::routes::query_id;
use crate::services::Facets;
use crate::state::AppState;

/// Most products shown on one collection page.
const PAGE_SIZE: i64 = 60;

#[derive(Clone)]
pub struct CategoryView {
    pub handle: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            handle: category.handle.to_string(),
            name: category.name.clone(),
            description: category.description.clone(),
        }
    }
}

/// An `<option>` in a listing filter.
#[derive(Clone)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// The filter bar as currently applied.
pub struct ListingFilterView {
    pub colors: Vec<FilterOption>,
    pub sizes: Vec<FilterOption>,
    pub sorts: Vec<FilterOption>,
    pub in_stock_only: bool,
}

impl ListingFilterView {
    #[must_use]
    pub fn build(facets: &Facets, filter: &ProductFilter) -> Self {
        let colors = facets
            .colors
            .iter()
            .map(|c| FilterOption {
                value: c.id.to_string(),
                label: c.name.clone(),
                selected: filter.color == Some(c.id),
            })
            .collect();
        let sizes = facets
            .sizes
            .iter()
            .map(|s| FilterOption {
                value: s.id.to_string(),
                label: s.label.clone(),
                selected: filter.size == Some(s.id),
            })
            .collect();
        let sorts = [
            (ProductSort::Newest, "Newest"),
            (ProductSort::PriceAsc, "Price: low to high"),
            (ProductSort::PriceDesc, "Price: high to low"),
            (ProductSort::TitleAsc, "Name"),
        ]
        .into_iter()
        .map(|(sort, label)| FilterOption {
            value: sort.as_str().to_owned(),
            label: label.to_owned(),
            selected: filter.sort == sort,
        })
        .collect();

        Self {
            colors,
            sizes,
            sorts,
            in_stock_only: filter.in_stock_only,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub color: Option<String>,
    pub size: Option<String>,
    pub sort: Option<String>,
    pub in_stock: Option<String>,
}

impl ListingQuery {
    /// Storefront filter for this query. Blank or unparseable values are
    /// ignored rather than rejected.
    #[must_use]
    pub fn to_filter(&self) -> ProductFilter {
        ProductFilter {
            color: query_id(self.color.as_deref()).map(ColorId::new),
            size: query_id(self.size.as_deref()).map(SizeId::new),
            sort: ProductSort::from_query(self.sort.as_deref()),
            in_stock_only: self
                .in_stock
                .as_deref()
                .is_some_and(|v| matches!(v, "1" | "true" | "on")),
            ..ProductFilter::default()
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "collections/index.html")]
pub struct CollectionsIndexTemplate {
    pub categories: Vec<CategoryView>,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "collections/show.html")]
pub struct CollectionShowTemplate {
    pub category: CategoryView,
    pub products: Vec<ProductCardView>,
    pub filters: ListingFilterView,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

/// Display all categories.
#[instrument(skip(state, customer, nonce))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> Result<CollectionsIndexTemplate> {
    let categories = state.catalog().categories().await?;
    Ok(CollectionsIndexTemplate {
        categories: categories.iter().map(CategoryView::from).collect(),
        customer,
        nonce,
    })
}

/// Display one category's products.
#[instrument(skip(state, customer, nonce))]
pub async fn show(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Query(query): Query<ListingQuery>,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> Result<CollectionShowTemplate> {
    let handle = path_handle(&handle, "collection")?;
    let catalog = state.catalog();
    let category = catalog
        .category(&handle)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("collection {handle}")))?;

    let filter = ProductFilter {
        category: Some(category.id),
        ..query.to_filter()
    };
    let products = catalog.products(&filter, PAGE_SIZE).await?;
    let facets = catalog.facets().await?;

    Ok(CollectionShowTemplate {
        category: CategoryView::from(&category),
        products: products.iter().map(ProductCardView::from).collect(),
        filters: ListingFilterView::build(&facets, &filter),
        customer,
        nonce,
    })
}

#[cfg(test)]
mod tests {
    use loomwear_core::catalog::{Color, Size};

    use super::*;

    #[test]
    fn blank_filter_values_are_ignored() {
        let query = ListingQuery {
            color: Some(String::new()),
            size: Some("abc".to_owned()),
            sort: Some("bogus".to_owned()),
            in_stock: None,
        };
        assert_eq!(query.to_filter(), ProductFilter::default());
    }

    #[test]
    fn filter_values_are_parsed() {
        let query = ListingQuery {
            color: Some("3".to_owned()),
            size: Some("2".to_owned()),
            sort: Some("price_desc".to_owned()),
            in_stock: Some("on".to_owned()),
        };
        let filter = query.to_filter();
        assert_eq!(filter.color, Some(ColorId::new(3)));
        assert_eq!(filter.size, Some(SizeId::new(2)));
        assert_eq!(filter.sort, ProductSort::PriceDesc);
        assert!(filter.in_stock_only);
        assert!(!filter.include_inactive);
    }

    #[test]
    fn filter_bar_marks_current_choices() {
        let facets = Facets {
            colors: vec![
                Color {
                    id: ColorId::new(1),
                    name: "Sand".to_owned(),
                    hex: "#d8c8a8".to_owned(),
                },
                Color {
                    id: ColorId::new(2),
                    name: "Navy".to_owned(),
                    hex: "#1f2a44".to_owned(),
                },
            ],
            sizes: vec![Size {
                id: SizeId::new(1),
                label: "S".to_owned(),
                sort_order: 0,
            }],
        };
        let filter = ProductFilter {
            color: Some(ColorId::new(2)),
            sort: ProductSort::TitleAsc,
            ..ProductFilter::default()
        };

        let view = ListingFilterView::build(&facets, &filter);
        let selected: Vec<&str> = view
            .colors
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.label.as_str())
            .collect();
        assert_eq!(selected, vec!["Navy"]);
        assert!(view.sorts.iter().any(|o| o.value == "title_asc" && o.selected));
        assert!(view.sizes.iter().all(|o| !o.selected));
    }
}
