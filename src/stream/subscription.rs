//! Program-account subscriptions over the node's websocket
//!
//! Each subscription runs in its own task and forwards decoded account
//! notifications into a bounded channel. A dropped connection is retried
//! after `subscription.reconnect_delay_ms` until the cancellation token
//! fires.

use futures_util::StreamExt;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_client::rpc_response::RpcKeyedAccount;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::raydium::program::{OPENBOOK_PROGRAM, POOL_STATUS_ACTIVE, RAYDIUM_AMM_V4};
use crate::raydium::{LiquidityStateV4, MarketStateV3};

/// One account notification
#[derive(Debug, Clone, PartialEq)]
pub struct AccountUpdate {
    pub account_id: Pubkey,
    pub data: Vec<u8>,
    pub slot: u64,
}

/// Notification tagged with the stream it came from
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Pool(AccountUpdate),
    Market(AccountUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Pool,
    Market,
}

impl StreamKind {
    fn wrap(self, update: AccountUpdate) -> FeedEvent {
        match self {
            StreamKind::Pool => FeedEvent::Pool(update),
            StreamKind::Market => FeedEvent::Market(update),
        }
    }
}

/// Server-side filtered `programSubscribe`
#[derive(Debug, Clone)]
pub struct ProgramSubscription {
    pub kind: StreamKind,
    pub program: Pubkey,
    pub filters: Vec<RpcFilterType>,
}

impl ProgramSubscription {
    /// Active AMM v4 pools quoted in `quote_mint` and backed by an
    /// OpenBook market
    pub fn pools(quote_mint: &Pubkey) -> Self {
        Self {
            kind: StreamKind::Pool,
            program: *RAYDIUM_AMM_V4,
            filters: vec![
                RpcFilterType::DataSize(LiquidityStateV4::LEN as u64),
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                    LiquidityStateV4::QUOTE_MINT_OFFSET,
                    quote_mint.as_ref(),
                )),
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                    LiquidityStateV4::MARKET_PROGRAM_OFFSET,
                    OPENBOOK_PROGRAM.as_ref(),
                )),
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                    LiquidityStateV4::STATUS_OFFSET,
                    &POOL_STATUS_ACTIVE.to_le_bytes(),
                )),
            ],
        }
    }

    /// OpenBook markets quoted in `quote_mint`
    pub fn markets(quote_mint: &Pubkey) -> Self {
        Self {
            kind: StreamKind::Market,
            program: *OPENBOOK_PROGRAM,
            filters: vec![
                RpcFilterType::DataSize(MarketStateV3::LEN as u64),
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                    MarketStateV3::QUOTE_MINT_OFFSET,
                    quote_mint.as_ref(),
                )),
            ],
        }
    }

    /// Whether raw account bytes satisfy every filter
    pub fn matches(&self, data: &[u8]) -> bool {
        self.filters.iter().all(|filter| match filter {
            RpcFilterType::DataSize(size) => data.len() as u64 == *size,
            RpcFilterType::Memcmp(memcmp) => memcmp.bytes_match(data),
            _ => true,
        })
    }
}

/// Decode a keyed account notification into raw bytes
pub fn decode_keyed(slot: u64, keyed: &RpcKeyedAccount) -> Option<AccountUpdate> {
    let account_id = Pubkey::from_str(&keyed.pubkey).ok()?;
    let account: Account = keyed.account.decode()?;
    Some(AccountUpdate {
        account_id,
        data: account.data,
        slot,
    })
}

/// Websocket subscription runner
#[derive(Debug, Clone)]
pub struct SubscriptionClient {
    ws_url: String,
    commitment: CommitmentConfig,
    reconnect_delay: Duration,
}

impl SubscriptionClient {
    pub fn new(ws_url: &str, commitment: CommitmentConfig, reconnect_delay: Duration) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            commitment,
            reconnect_delay,
        }
    }

    /// Run `subscription` in a background task until cancelled or the
    /// receiver is dropped
    pub fn spawn(
        &self,
        subscription: ProgramSubscription,
        events: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let client = self.clone();

        tokio::spawn(async move {
            info!(
                "Subscribing to {:?} accounts of program {}",
                subscription.kind, subscription.program
            );

            loop {
                if cancel.is_cancelled() || events.is_closed() {
                    break;
                }

                match client.stream_once(&subscription, &events, &cancel).await {
                    Ok(()) => break,
                    Err(e) => error!("{:?} subscription error: {}", subscription.kind, e),
                }

                warn!(
                    "Reconnecting {:?} subscription in {:?}...",
                    subscription.kind, client.reconnect_delay
                );
                tokio::select! {
                    _ = tokio::time::sleep(client.reconnect_delay) => {}
                    _ = cancel.cancelled() => break,
                }
            }

            info!("{:?} subscription stopped", subscription.kind);
        })
    }

    /// One connection lifetime. `Ok` means a clean stop (cancelled or
    /// receiver gone); `Err` means the connection should be retried.
    async fn stream_once(
        &self,
        subscription: &ProgramSubscription,
        events: &mpsc::Sender<FeedEvent>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let pubsub = PubsubClient::new(&self.ws_url).await?;

        let config = RpcProgramAccountsConfig {
            filters: Some(subscription.filters.clone()),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..Default::default()
            },
            with_context: Some(true),
            ..Default::default()
        };

        let (mut notifications, unsubscribe) = pubsub
            .program_subscribe(&subscription.program, Some(config))
            .await?;
        info!("{:?} subscription connected", subscription.kind);

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                next = notifications.next() => match next {
                    Some(response) => {
                        let Some(update) = decode_keyed(response.context.slot, &response.value) else {
                            debug!("Undecodable notification for {}", response.value.pubkey);
                            continue;
                        };
                        if events.send(subscription.kind.wrap(update)).await.is_err() {
                            break Ok(());
                        }
                    }
                    None => {
                        break Err(Error::Subscription(format!(
                            "{:?} stream ended",
                            subscription.kind
                        )));
                    }
                }
            }
        };

        drop(notifications);
        unsubscribe().await;
        outcome
    }
}
