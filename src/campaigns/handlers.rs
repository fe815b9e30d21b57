use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::billing::resolve_plan;
use crate::campaigns::{generate_code, CampaignLinkView};
use crate::error::{AppError, DatabaseError};
use crate::restaurants::load_managed;
use crate::tracking::clean_field;
use crate::AppState;

const CODE_ATTEMPTS: usize = 5;

pub async fn list(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    load_managed(&state.db, id, &auth.user).await?;

    let base = &state.config.server.public_base_url;
    let links: Vec<CampaignLinkView> = state
        .db
        .list_campaign_links(id)
        .await?
        .into_iter()
        .map(|l| CampaignLinkView::new(l, base))
        .collect();
    Ok(HttpResponse::Ok().json(links))
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub source: Option<String>,
    pub medium: Option<String>,
}

pub async fn create(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<CreateCampaignRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    load_managed(&state.db, id, &auth.user).await?;

    let body = body.into_inner();
    let name = clean_field(Some(body.name), 120)
        .ok_or_else(|| AppError::ValidationError("name is required".into()))?;
    let source = clean_field(body.source, 64);
    let medium = clean_field(body.medium, 64);

    let plan = resolve_plan(&state.db, id).await?.plan;
    let limit = plan.campaign_link_limit();
    if state.db.count_campaign_links(id).await? >= limit {
        return Err(AppError::PlanLimit(format!(
            "the {} plan allows {} campaign link(s)",
            plan.as_str(),
            limit
        )));
    }

    for attempt in 1..=CODE_ATTEMPTS {
        let code = generate_code();
        match state
            .db
            .create_campaign_link(id, &code, &name, source.as_deref(), medium.as_deref())
            .await
        {
            Ok(link) => {
                info!(restaurant_id = %id, code = %link.code, "Campaign link created");
                let view = CampaignLinkView::new(link, &state.config.server.public_base_url);
                return Ok(HttpResponse::Created().json(view));
            }
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                warn!(%code, attempt, "Campaign code collision");
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::InternalError("could not allocate a unique campaign code".into()))
}

pub async fn delete(
    auth: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (id, campaign_id) = path.into_inner();
    load_managed(&state.db, id, &auth.user).await?;

    if !state.db.delete_campaign_link(id, campaign_id).await? {
        return Err(AppError::NotFound(format!("campaign link {}", campaign_id)));
    }
    info!(restaurant_id = %id, %campaign_id, "Campaign link deleted");
    Ok(HttpResponse::NoContent().finish())
}
