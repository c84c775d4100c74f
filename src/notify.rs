//! Trade notifications to a Discord-style webhook
//!
//! Delivery is fire-and-forget: each message is posted from its own task
//! and failures are only logged.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NotifyConfig;
use crate::error::{Error, Result};
use crate::trading::{Fill, Side};

const NOT_APPLICABLE: &str = "N/A";

/// DexScreener page for `mint` filtered to the wallet's trades
pub fn maker_link(mint: &Pubkey, wallet: &Pubkey) -> String {
    format!("https://dexscreener.com/solana/{}?maker={}", mint, wallet)
}

/// Profit or loss of `price` against `entry` in percent
pub fn profit_loss_pct(entry: f64, price: f64) -> Option<f64> {
    (entry > 0.0 && price.is_finite()).then(|| (price - entry) / entry * 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeNotification {
    pub side: Side,
    pub token: Pubkey,
    pub wallet: Pubkey,
    pub amount_in: String,
    pub amount_out: String,
    pub sell_percentage: String,
    pub profit_loss: String,
    pub value: String,
    pub link: String,
}

impl TradeNotification {
    pub fn from_fill(fill: &Fill, wallet: &Pubkey, quote_symbol: &str, entry_price: Option<f64>) -> Self {
        let value = fill
            .price_usd
            .map(|p| format!("{:.11} USD", p))
            .unwrap_or_else(|| NOT_APPLICABLE.to_string());
        let token_amount = format!("{}", fill.token_ui_amount());
        let quote_amount = format!("{} {}", fill.quote_amount, quote_symbol);

        match fill.side {
            Side::Buy => Self {
                side: fill.side,
                token: fill.mint,
                wallet: *wallet,
                amount_in: quote_amount,
                amount_out: token_amount,
                sell_percentage: NOT_APPLICABLE.to_string(),
                profit_loss: NOT_APPLICABLE.to_string(),
                value,
                link: maker_link(&fill.mint, wallet),
            },
            Side::Sell => Self {
                side: fill.side,
                token: fill.mint,
                wallet: *wallet,
                amount_in: token_amount,
                amount_out: quote_amount,
                sell_percentage: "100%".to_string(),
                profit_loss: entry_price
                    .zip(fill.price_usd)
                    .and_then(|(entry, price)| profit_loss_pct(entry, price))
                    .map(|pct| format!("{:.6}%", pct))
                    .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
                value,
                link: maker_link(&fill.mint, wallet),
            },
        }
    }

    /// Message body as a fenced text block
    pub fn render(&self) -> String {
        format!(
            "```\n{}\n\nToken Address\n{}\n\nWallet\n{}\n\nAmount In\n{}\n\nAmount Out\n{}\n\n\
             Sell Percentage\n{}\n\nProfit/Loss\n{}\n\nBuy/sell value\n{}\n\nDex\n{}\n```",
            self.side,
            self.token,
            self.wallet,
            self.amount_in,
            self.amount_out,
            self.sell_percentage,
            self.profit_loss,
            self.value,
            self.link
        )
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: String,
    username: &'a str,
}

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    username: String,
}

impl Notifier {
    pub fn from_config(config: &NotifyConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            webhook_url: config
                .discord_webhook_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
            username: config.username.clone(),
        }
    }

    /// Notifier that drops every message
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: None,
            username: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Post in the background; never blocks the caller
    pub fn notify(&self, notification: TradeNotification) {
        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let client = self.client.clone();
        let username = self.username.clone();

        tokio::spawn(async move {
            let payload = WebhookPayload {
                content: notification.render(),
                username: &username,
            };
            match post(&client, &url, &payload).await {
                Ok(()) => debug!("{} notification sent for {}", notification.side, notification.token),
                Err(e) => warn!("Notification for {} failed: {}", notification.token, e),
            }
        });
    }
}

async fn post(client: &reqwest::Client, url: &str, payload: &WebhookPayload<'_>) -> Result<()> {
    let response = client.post(url).json(payload).send().await?;
    if !response.status().is_success() {
        return Err(Error::Http(format!("webhook returned {}", response.status())));
    }
    Ok(())
}
