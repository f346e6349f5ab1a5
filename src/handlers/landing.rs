use askama::Template;
use axum::extract::Query;
use axum::response::Html;
use axum::Extension;
use serde::Deserialize;

use crate::error::{AppResult, RenderHtml};
use crate::filters;
use crate::form_utils::deserialize_optional_string;
use crate::handlers::layout::{Flash, Layout};
use crate::models::CurrentUser;
use crate::services::checkout::Plan;

pub struct PlanCard {
    pub id: &'static str,
    pub label: &'static str,
    pub price: String,
    pub tagline: &'static str,
    pub features: &'static [&'static str],
    pub popular: bool,
    pub selected: bool,
}

impl PlanCard {
    fn new(plan: Plan, selected: Option<Plan>) -> Self {
        Self {
            id: plan.as_str(),
            label: plan.label(),
            price: filters::format_money(plan.price_cents(), "USD"),
            tagline: plan.tagline(),
            features: plan.features(),
            popular: plan == Plan::Premium,
            selected: selected == Some(plan),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/landing.html")]
pub struct LandingTemplate {
    pub layout: Layout,
    pub plans: Vec<PlanCard>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LandingParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub plan: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub payment: Option<String>,
}

pub async fn index(
    user: Option<Extension<CurrentUser>>,
    Query(params): Query<LandingParams>,
    Query(mut flash): Query<Flash>,
) -> AppResult<Html<String>> {
    if params.payment.as_deref() == Some("canceled") && flash.notice.is_none() {
        flash.notice = Some("Payment was canceled. You can choose a plan at any time.".into());
    }
    let selected = params.plan.as_deref().map(Plan::from_id);
    let user = user.map(|Extension(u)| u);

    let template = LandingTemplate {
        layout: Layout::public("Budget Savvy", user.as_ref(), flash),
        plans: Plan::all().iter().map(|p| PlanCard::new(*p, selected)).collect(),
    };
    template.render_html()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_cards() {
        let cards: Vec<PlanCard> = Plan::all()
            .iter()
            .map(|p| PlanCard::new(*p, Some(Plan::Family)))
            .collect();
        assert_eq!(cards.len(), 3);
        assert!(cards[1].popular);
        assert!(cards[2].selected);
        assert!(!cards[0].selected);
        assert_eq!(cards[0].price, filters::format_money(0, "USD"));
    }
}
