use async_trait::async_trait;
use futures_util::{FutureExt, StreamExt};
use lapin::{
    BasicProperties, Channel,
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions},
    types::{FieldTable, ShortString},
};
use std::{fmt::Display, future::Future, panic::AssertUnwindSafe, sync::Arc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{Instrument, debug, error, info_span, warn};

use super::handlers::RpcHandler;

const REPLY_CONTENT_TYPE: &str = "text/plain";

/// What happens to a delivery once it has been answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Settlement {
    Ack,
    /// Publishing failed; put it back so it is answered later.
    Requeue,
    /// The reply cannot be produced; retrying would fail the same way.
    Reject,
}

/// Where replies go. Implemented by the broker channel.
#[async_trait]
pub(crate) trait ReplyPublisher: Send + Sync {
    async fn publish(
        &self,
        reply_to: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> anyhow::Result<()>;
}

#[async_trait]
impl ReplyPublisher for Channel {
    async fn publish(
        &self,
        reply_to: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> anyhow::Result<()> {
        self.basic_publish(
            "",
            reply_to,
            BasicPublishOptions::default(),
            body,
            properties,
        )
        .await
        .map(|_confirm| ())
        .map_err(anyhow::Error::from)
    }
}

/// Properties for a reply: the caller's correlation id echoed verbatim.
pub(crate) fn reply_properties(correlation_id: Option<&ShortString>) -> BasicProperties {
    let properties = BasicProperties::default().with_content_type(REPLY_CONTENT_TYPE.into());
    match correlation_id {
        Some(id) => properties.with_correlation_id(id.clone()),
        None => properties,
    }
}

/// Run the handler and publish its reply. The returned settlement is only
/// [`Settlement::Ack`] once the reply is out, or when there is nobody to answer.
pub(crate) async fn answer(
    publisher: &dyn ReplyPublisher,
    handler: &dyn RpcHandler,
    body: &[u8],
    request: &BasicProperties,
) -> Settlement {
    let reply = match handler.handle(body).await {
        Ok(reply) => reply,
        Err(err) => {
            error!("Failed to encode reply: {err}");
            return Settlement::Reject;
        }
    };

    let Some(reply_to) = request.reply_to().as_ref() else {
        warn!("Delivery without reply_to, nothing to answer");
        return Settlement::Ack;
    };

    let properties = reply_properties(request.correlation_id().as_ref());
    match publisher.publish(reply_to.as_str(), &reply, properties).await {
        Ok(()) => {
            debug!("reply published");
            Settlement::Ack
        }
        Err(err) => {
            error!("Failed to publish reply: {err:#}");
            Settlement::Requeue
        }
    }
}

async fn settle(delivery: &Delivery, settlement: Settlement) {
    let result = match settlement {
        Settlement::Ack => delivery.acker.ack(BasicAckOptions::default()).await,
        Settlement::Requeue | Settlement::Reject => {
            let options = BasicNackOptions {
                requeue: settlement == Settlement::Requeue,
                ..BasicNackOptions::default()
            };
            delivery.acker.nack(options).await
        }
    };
    if let Err(err) = result {
        error!(?settlement, "Failed to settle delivery: {err}");
    }
}

/// Consume `queue` one delivery at a time until the consumer stream ends.
///
/// The channel must already have prefetch set to 1.
pub(crate) async fn run(
    channel: Channel,
    queue: String,
    handler: Arc<dyn RpcHandler>,
) -> Result<(), lapin::Error> {
    let mut consumer = channel
        .basic_consume(
            &queue,
            &format!("{queue}.worker"),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        let correlation_id = delivery
            .properties
            .correlation_id()
            .as_ref()
            .map_or("none", ShortString::as_str)
            .to_string();
        let span = info_span!(
            "amqp.delivery",
            messaging.system = "rabbitmq",
            messaging.destination = %queue,
            messaging.correlation_id = %correlation_id
        );
        async {
            let settlement = answer(
                &channel,
                handler.as_ref(),
                &delivery.data,
                &delivery.properties,
            )
            .await;
            settle(&delivery, settlement).await;
        }
        .instrument(span)
        .await;
    }

    Ok(())
}

/// Drive a worker to completion and signal `shutdown` however it ends,
/// including by panic.
pub(crate) async fn supervise<F, E>(queue: &str, worker: F, shutdown: UnboundedSender<()>)
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match AssertUnwindSafe(worker).catch_unwind().await {
        Ok(Ok(())) => error!(queue, "consumer stream ended"),
        Ok(Err(err)) => error!(queue, "worker failed: {err}"),
        Err(_) => error!(queue, "worker panicked"),
    }
    let _ = shutdown.send(());
}
