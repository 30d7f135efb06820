//! Inbound handlers of the logs service.
//!
//! ```text
//! putLog                         ─┐
//! visitor:*                       │  fire-and-forget
//! putActivityLog (add | remove*)  ├─ (redelivered on failure)
//! logs.activityLogs.updateMany    │
//! logs.delete.old                ─┘
//! logs.activityLogs.findMany     ─┐  RPC
//! logs.activityLogs.insertMany   ─┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use switchyard_broker::{CommandDispatcher, DispatchError, Idempotence, Json, TenantResolver};
use switchyard_messaging::MessageEnvelope;

use crate::commands::{
    ActivityLogCommand, DeleteOldLogs, FindManyActivityLogs, InsertManyActivityLogs,
    UpdateManyActivityLogs, VisitorLocationUpdate, VisitorRef, queues,
};
use crate::models::{ActivityLog, LogInput, LogsModels, VisitorInput};

/// Subscribe every logs queue on `dispatcher`.
pub async fn register<R>(dispatcher: &CommandDispatcher<R>) -> Result<(), DispatchError>
where
    R: TenantResolver<Context = Arc<LogsModels>>,
{
    dispatcher
        .register_fire_and_forget(
            queues::PUT_LOG,
            Idempotence::KeyedBy("id"),
            |models: Arc<LogsModels>, Json(input): Json<LogInput>| async move {
                models.logs().put(input, Utc::now())?;
                Ok::<(), anyhow::Error>(())
            },
        )
        .await?;

    dispatcher
        .register_fire_and_forget(
            queues::VISITOR_CREATE_OR_UPDATE,
            Idempotence::Natural,
            |models: Arc<LogsModels>, Json(input): Json<VisitorInput>| async move {
                models.visitors().create_or_update(input, Utc::now())?;
                Ok::<(), anyhow::Error>(())
            },
        )
        .await?;

    let broker = Arc::clone(dispatcher.broker());
    dispatcher
        .register_fire_and_forget(
            queues::VISITOR_CONVERT_REQUEST,
            Idempotence::Natural,
            move |models: Arc<LogsModels>, Json(req): Json<VisitorRef>| {
                let broker = Arc::clone(&broker);
                async move {
                    let visitor = models.visitors().get(&req.visitor_id);
                    let envelope = MessageEnvelope::new(
                        models.tenant().clone(),
                        json!({ "visitorId": req.visitor_id, "visitor": visitor }),
                    );
                    broker
                        .publish(queues::VISITOR_CONVERT_RESPONSE, envelope)
                        .await?;
                    Ok::<(), anyhow::Error>(())
                }
            },
        )
        .await?;

    dispatcher
        .register_fire_and_forget(
            queues::VISITOR_UPDATE_ENTRY,
            Idempotence::Natural,
            |models: Arc<LogsModels>, Json(update): Json<VisitorLocationUpdate>| async move {
                if !models
                    .visitors()
                    .update_location(&update.visitor_id, update.location, Utc::now())
                {
                    debug!(visitor_id = %update.visitor_id, "visitor not found; nothing to update");
                }
                Ok::<(), anyhow::Error>(())
            },
        )
        .await?;

    dispatcher
        .register_fire_and_forget(
            queues::VISITOR_REMOVE_ENTRY,
            Idempotence::Natural,
            |models: Arc<LogsModels>, Json(req): Json<VisitorRef>| async move {
                models.visitors().remove(&req.visitor_id);
                Ok::<(), anyhow::Error>(())
            },
        )
        .await?;

    dispatcher
        .register_fire_and_forget(
            queues::PUT_ACTIVITY_LOG,
            Idempotence::KeyedBy("id"),
            |models: Arc<LogsModels>, command: ActivityLogCommand| async move {
                let activity_logs = models.activity_logs();
                match command {
                    ActivityLogCommand::Add(input) => {
                        activity_logs.add(input, Utc::now())?;
                    }
                    ActivityLogCommand::RemoveMany(remove) => {
                        let removed =
                            activity_logs.remove_activity_logs(&remove.content_type, &remove.item_ids);
                        debug!(content_type = %remove.content_type, removed, "removed activity logs");
                    }
                    ActivityLogCommand::RemoveForContent(remove) => {
                        let removed = activity_logs.remove_activity_log(&remove.content_id);
                        debug!(content_id = %remove.content_id, removed, "removed activity logs");
                    }
                }
                Ok::<(), anyhow::Error>(())
            },
        )
        .await?;

    dispatcher
        .register_fire_and_forget(
            queues::ACTIVITY_LOGS_UPDATE_MANY,
            Idempotence::Natural,
            |models: Arc<LogsModels>, Json(update): Json<UpdateManyActivityLogs>| async move {
                let (Some(query), Some(modifier)) = (update.query, update.modifier) else {
                    debug!("updateMany without query or modifier; ignoring");
                    return Ok(());
                };
                let updated = models
                    .activity_logs()
                    .update_many(&query, &modifier.into_patch());
                debug!(updated, "updated activity logs");
                Ok::<(), anyhow::Error>(())
            },
        )
        .await?;

    dispatcher
        .register_fire_and_forget(
            queues::DELETE_OLD,
            Idempotence::Natural,
            |models: Arc<LogsModels>, Json(req): Json<Option<DeleteOldLogs>>| async move {
                let months = req.unwrap_or_default().months;
                models.logs().delete_older_than(months, Utc::now())?;
                Ok::<(), anyhow::Error>(())
            },
        )
        .await?;

    dispatcher
        .register_rpc(
            queues::ACTIVITY_LOGS_FIND_MANY,
            |models: Arc<LogsModels>, Json(req): Json<Option<FindManyActivityLogs>>| async move {
                let req = req.unwrap_or_default();
                Ok::<Vec<ActivityLog>, anyhow::Error>(models.activity_logs().find(&req.query, &req.options))
            },
        )
        .await?;

    dispatcher
        .register_rpc(
            queues::ACTIVITY_LOGS_INSERT_MANY,
            |models: Arc<LogsModels>, Json(req): Json<InsertManyActivityLogs>| async move {
                let inserted = models.activity_logs().insert_many(req.rows, Utc::now())?;
                Ok::<Vec<ActivityLog>, anyhow::Error>(inserted)
            },
        )
        .await?;

    info!(
        handlers = dispatcher.registrations().len(),
        "logs queues registered"
    );
    Ok(())
}
