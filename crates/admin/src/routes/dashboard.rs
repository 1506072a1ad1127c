//! Dashboard: what is in the catalog and where orders stand.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use crate::db::DashboardRepository;
use crate::db::dashboard::{EntityCounts, StatusCount};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::CurrentAdmin;
use crate::state::AppState;

/// One order status row on the dashboard.
pub struct StatusRowView {
    pub status: &'static str,
    pub label: &'static str,
    pub count: i64,
}

impl From<&StatusCount> for StatusRowView {
    fn from(row: &StatusCount) -> Self {
        Self {
            status: row.status.as_str(),
            label: row.status.label(),
            count: row.count,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin: Option<CurrentAdmin>,
    pub can_write: bool,
    pub counts: EntityCounts,
    pub statuses: Vec<StatusRowView>,
}

/// GET /
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<DashboardTemplate> {
    let repo = DashboardRepository::new(state.pool());
    let counts = repo.counts().await?;
    let statuses = repo.orders_by_status().await?;

    Ok(DashboardTemplate {
        can_write: admin.role.can_write(),
        admin: Some(admin),
        counts,
        statuses: statuses.iter().map(StatusRowView::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use loomwear_core::{AdminRole, AdminUserId, Email, OrderStatus};

    use super::*;

    #[test]
    fn renders_counts_and_statuses() {
        let admin = CurrentAdmin {
            id: AdminUserId::new(1),
            email: Email::parse("ops@loomwear.test").unwrap_or_else(|_| unreachable!()),
            name: "Ops".to_owned(),
            role: AdminRole::Viewer,
        };
        let html = DashboardTemplate {
            can_write: admin.role.can_write(),
            admin: Some(admin),
            counts: EntityCounts {
                products: 1234,
                ..EntityCounts::default()
            },
            statuses: vec![StatusRowView::from(&StatusCount {
                status: OrderStatus::Shipped,
                count: 3,
            })],
        }
        .render()
        .unwrap_or_default();

        assert!(html.contains("1,234"));
        assert!(html.contains("Shipped"));
        assert!(html.contains("Read-only"));
    }
}
