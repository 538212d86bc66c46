use crate::errors::ToolError;
use crate::managers::{connect, finish, report, upstream, ActionResult, Exit};
use crate::services::logger::Logger;
use crate::services::pilldoc_client::PilldocConnector;
use crate::services::tool_executor::ToolHandler;
use crate::services::validation::Validation;
use crate::utils::filter_params::{keys, normalize_filter_value};
use crate::utils::records::normalize_bizno;
use crate::utils::tool_errors::unknown_action_error;
use serde_json::Value;
use std::sync::Arc;

const CAMPAIGN_ACTIONS: &[&str] = &["rejects", "reject"];

#[derive(Clone)]
pub struct CampaignsManager {
    logger: Logger,
    validation: Validation,
    connector: Arc<dyn PilldocConnector>,
}

impl CampaignsManager {
    pub fn new(logger: Logger, connector: Arc<dyn PilldocConnector>) -> Self {
        Self {
            logger: logger.child("campaigns"),
            validation: Validation::new(),
            connector,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        let result = match action.and_then(Value::as_str).unwrap_or("") {
            "rejects" => self.rejects(&args).await,
            "reject" => self.reject(&args).await,
            _ => return Err(unknown_action_error("pilldoc_campaigns", action, CAMPAIGN_ACTIONS)),
        };
        finish(result)
    }

    fn biz_no(&self, args: &Value) -> Result<String, Exit> {
        normalize_filter_value(args)
            .text(keys::BIZ_NO)
            .map(|raw| normalize_bizno(&raw))
            .ok_or_else(|| report("bizNo is required"))
    }

    async fn rejects(&self, args: &Value) -> ActionResult {
        let biz_no = self.biz_no(args)?;
        let api = connect(self.connector.as_ref(), args).await?;
        api.get_rejected_campaigns(&biz_no)
            .await
            .map_err(|err| upstream(err, "adps_rejects"))
    }

    async fn reject(&self, args: &Value) -> ActionResult {
        let biz_no = self.biz_no(args)?;
        let campaign_id = self
            .validation
            .ensure_positive_int(args.get("campaignId"), "campaignId")?;
        let comment = self
            .validation
            .ensure_optional_string(args.get("comment"), "comment")?;
        let api = connect(self.connector.as_ref(), args).await?;
        let result = api
            .reject_campaign(&biz_no, campaign_id, comment.as_deref())
            .await
            .map_err(|err| upstream(err, "adps_reject"))?;
        self.logger.info(
            "Campaign rejected",
            Some(&serde_json::json!({"biz_no": biz_no, "campaign_id": campaign_id})),
        );
        Ok(result)
    }
}

#[async_trait::async_trait]
impl ToolHandler for CampaignsManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
